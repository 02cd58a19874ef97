use crate::llm::types::{ContentPart, ImageUrl, MessageContent, WireMessage};
use crate::models::message::{Attachment, AttachmentType, Message, Role};

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Build the outbound message list: flatten attachments and fold `context`
/// into a single leading system message.
pub fn build_wire_messages(history: &[Message], context: &str) -> Vec<WireMessage> {
    let mut messages: Vec<WireMessage> = history.iter().map(to_wire_message).collect();
    inject_context(&mut messages, context);
    messages
}

pub fn to_wire_message(message: &Message) -> WireMessage {
    let mut text = message.content.clone();
    let mut images = Vec::new();

    for att in message.attachments.iter().flatten() {
        match att.kind {
            AttachmentType::Image => images.push(ContentPart::ImageUrl {
                image_url: ImageUrl { url: image_url(att) },
            }),
            AttachmentType::Text => {
                text.push_str(&format!(
                    "\n\n[Attached File: {}]\n```\n{}\n```",
                    att.name, att.content
                ));
            }
        }
    }

    let content = if images.is_empty() {
        MessageContent::Text(text)
    } else {
        let mut parts = vec![ContentPart::Text { text }];
        parts.extend(images);
        MessageContent::Parts(parts)
    };

    WireMessage {
        role: message.role,
        content,
        tool_call_id: message.tool_call_id.clone(),
        tool_calls: message.tool_calls.clone(),
    }
}

/// Data URIs pass through untouched; bare base64 gets a `data:` prefix.
pub fn image_url(att: &Attachment) -> String {
    if att.content.starts_with("data:") {
        return att.content.clone();
    }
    let mime = att.mime_type.as_deref().unwrap_or(DEFAULT_IMAGE_MIME);
    format!("data:{};base64,{}", mime, att.content)
}

/// Append to the first system message, or insert one at the front. Never
/// produces a second system message.
pub fn inject_context(messages: &mut Vec<WireMessage>, context: &str) {
    if context.is_empty() {
        return;
    }
    match messages.iter_mut().find(|m| m.role == Role::System) {
        Some(system) => system.content.append_text(&format!("\n\nContext:\n{context}")),
        None => messages.insert(0, WireMessage::text(Role::System, format!("Context:\n{context}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ToolCallRequest;

    #[test]
    fn test_plain_message_stays_a_string() {
        let wire = to_wire_message(&Message::user("hello"));
        assert_eq!(wire.content, MessageContent::Text("hello".into()));
    }

    #[test]
    fn test_text_attachment_is_inlined() {
        let msg = Message::user("see file").with_attachments(vec![Attachment::text("a.txt", "body")]);
        let wire = to_wire_message(&msg);
        assert_eq!(
            wire.content,
            MessageContent::Text("see file\n\n[Attached File: a.txt]\n```\nbody\n```".into())
        );
    }

    #[test]
    fn test_image_attachment_becomes_block() {
        let msg = Message::user("look").with_attachments(vec![
            Attachment::image("a.png", "AAAA", Some("image/png".into())),
            Attachment::text("notes.md", "n"),
            Attachment::image("b", "BBBB", None),
            Attachment::image("c", "data:image/gif;base64,CC", None),
        ]);
        let wire = to_wire_message(&msg);
        let MessageContent::Parts(parts) = wire.content else {
            panic!("expected block content");
        };
        assert_eq!(parts.len(), 4);
        assert_eq!(
            parts[0],
            ContentPart::Text { text: "look\n\n[Attached File: notes.md]\n```\nn\n```".into() }
        );
        let urls: Vec<&str> = parts[1..]
            .iter()
            .map(|p| match p {
                ContentPart::ImageUrl { image_url } => image_url.url.as_str(),
                ContentPart::Text { .. } => panic!("unexpected text block"),
            })
            .collect();
        assert_eq!(
            urls,
            vec![
                "data:image/png;base64,AAAA",
                "data:image/jpeg;base64,BBBB",
                "data:image/gif;base64,CC"
            ]
        );
    }

    #[test]
    fn test_context_inserted_as_system_message() {
        let wire = build_wire_messages(&[Message::user("q")], "dash info");
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, Role::System);
        assert_eq!(wire[0].content.as_text(), Some("Context:\ndash info"));
    }

    #[test]
    fn test_context_appended_to_existing_system_message() {
        let history = vec![Message::user("q"), Message::system("be brief")];
        let wire = build_wire_messages(&history, "ctx");
        assert_eq!(wire.len(), 2);
        assert_eq!(wire.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(wire[1].content.as_text(), Some("be brief\n\nContext:\nctx"));
    }

    #[test]
    fn test_empty_context_is_ignored() {
        let wire = build_wire_messages(&[Message::user("q")], "");
        assert_eq!(wire.len(), 1);
    }

    #[test]
    fn test_tool_fields_carried() {
        let mut assistant = Message::assistant("");
        assistant.tool_calls = Some(vec![ToolCallRequest::new("c1", "f", "{}")]);
        let wire = build_wire_messages(&[assistant, Message::tool_result("c1", "\"ok\"")], "");
        assert_eq!(wire[0].tool_calls.as_ref().unwrap()[0].id, "c1");
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("c1"));
    }
}
