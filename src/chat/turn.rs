//! Turn runner: the caller side of the agent loop.
//!
//! A turn appends the user message, runs the agent loop while tracking the
//! assistant placeholder and the thinking timer, and commits the transcript
//! to the session store exactly once, whatever way the loop ends.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::chat::agent_loop::AgentLoop;
use crate::chat::context::resolve_context;
use crate::chat::thinking::{split_thinking, BlockState, ElapsedTicker, ThinkingTimer, TimerTransition};
use crate::error::{AppError, AppResult};
use crate::llm::types::ModelType;
use crate::models::message::{Attachment, Message, ToolExecution};
use crate::models::session::ChatSession;
use crate::state::AppState;
use crate::tools::client::discover_tool_schemas;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// Existing session to continue; a new one is created when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub model: ModelType,
}

/// Progress notifications for a running turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    Update {
        session_id: String,
        content: String,
        tool_executions: Vec<ToolExecution>,
        thinking: BlockState,
    },
    #[serde(rename_all = "camelCase")]
    ThinkingElapsed { session_id: String, seconds: u64 },
    #[serde(rename_all = "camelCase")]
    Completed {
        session_id: String,
        thinking_seconds: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Interrupted { session_id: String },
    #[serde(rename_all = "camelCase")]
    Failed { session_id: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Completed,
    Interrupted,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub session_id: String,
    pub status: TurnStatus,
    /// The committed session; `None` when the turn was cancelled before the
    /// assistant placeholder existed.
    pub session: Option<ChatSession>,
}

/// Asks the model to critique and rewrite a draft prompt.
pub const REVIEW_PROMPT_TEMPLATE: &str = "Please review and improve the following prompt. Provide:
1. A critique of what could be improved
2. A rewritten, better version of the prompt
3. Explanation of the improvements

Original prompt:
";

/// A draft prompt to be reviewed in a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub content: String,
    #[serde(default)]
    pub model: ModelType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnMode {
    Chat,
    /// Prompt review: always a new session, never offers tools.
    Review,
}

pub fn review_message(draft: &str) -> String {
    format!("{REVIEW_PROMPT_TEMPLATE}{draft}")
}

/// Run one turn to completion. Backend failures and cancellation are folded
/// into the outcome; only invalid input and infrastructure failures are
/// returned as errors.
pub async fn run_turn(
    state: &AppState,
    request: TurnRequest,
    events: Option<UnboundedSender<ChatEvent>>,
) -> AppResult<TurnOutcome> {
    if request.content.trim().is_empty() && request.attachments.is_empty() {
        return Err(AppError::InvalidRequest("Message is empty".into()));
    }
    start_turn(state, request, TurnMode::Chat, events).await
}

/// Review a draft prompt in a fresh session without tools.
pub async fn run_review_turn(
    state: &AppState,
    review: ReviewRequest,
    events: Option<UnboundedSender<ChatEvent>>,
) -> AppResult<TurnOutcome> {
    if review.content.trim().is_empty() {
        return Err(AppError::InvalidRequest("Prompt to review is empty".into()));
    }
    let request = TurnRequest {
        session_id: None,
        content: review_message(&review.content),
        attachments: Vec::new(),
        model: review.model,
    };
    start_turn(state, request, TurnMode::Review, events).await
}

async fn start_turn(
    state: &AppState,
    request: TurnRequest,
    mode: TurnMode,
    events: Option<UnboundedSender<ChatEvent>>,
) -> AppResult<TurnOutcome> {
    let session_id = match (mode, request.session_id.as_deref()) {
        (TurnMode::Chat, Some(id)) if !id.is_empty() => id.to_string(),
        _ => state.sessions.generate_id(),
    };

    let (turn, superseded) = state.begin_turn(&session_id).await;
    // Fires on every exit, including when this future is dropped
    let _done = turn.done.clone().drop_guard();
    if let Some(previous) = superseded {
        log::debug!("[Chat] Waiting for turn {} to commit", previous.turn_id);
        previous.finished().await;
    }

    log::info!(
        "[Chat] Turn started: session_id={}, mode={:?}, model={:?}, content_len={}",
        session_id,
        mode,
        request.model,
        request.content.len()
    );
    let result = drive_turn(state, &session_id, request, mode, &turn.cancel, events).await;
    state.finish_turn(&session_id, &turn.turn_id).await;
    result
}

async fn drive_turn(
    state: &AppState,
    session_id: &str,
    request: TurnRequest,
    mode: TurnMode,
    cancel: &CancellationToken,
    events: Option<UnboundedSender<ChatEvent>>,
) -> AppResult<TurnOutcome> {
    let settings = state.settings();

    let history = {
        let sessions = state.sessions.clone();
        let id = session_id.to_string();
        tokio::task::spawn_blocking(move || sessions.get_session(&id))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map(|s| s.messages)
            .unwrap_or_default()
    };
    let mut messages = history;
    messages.push(Message::user(request.content).with_attachments(request.attachments));

    let context = resolve_context(state.context_provider.as_deref()).await;
    let tool_client = match mode {
        TurnMode::Chat => state.tool_client.as_deref(),
        TurnMode::Review => None,
    };
    let schemas = match tool_client {
        Some(client) => discover_tool_schemas(client).await,
        None => Vec::new(),
    };

    let mut progress = TurnProgress::new(session_id, events);

    if cancel.is_cancelled() {
        log::info!("[Chat] Turn cancelled before the assistant replied: {}", session_id);
        progress.emit(ChatEvent::Interrupted {
            session_id: session_id.to_string(),
        });
        return Ok(TurnOutcome {
            session_id: session_id.to_string(),
            status: TurnStatus::Interrupted,
            session: None,
        });
    }

    let agent = AgentLoop::new(state.backend.as_ref())
        .with_tools(tool_client, &schemas)
        .with_max_iterations(settings.max_tool_iterations);
    let result = agent
        .chat(&messages, &context, request.model, cancel, |content, executions| {
            progress.update(content, executions)
        })
        .await;

    let events = progress.events.clone();
    let (status, assistant, event) = match result {
        Ok(content) => {
            progress.content = content;
            let message = progress.into_message(false);
            let event = ChatEvent::Completed {
                session_id: session_id.to_string(),
                thinking_seconds: message.thinking_seconds,
            };
            (TurnStatus::Completed, message, event)
        }
        Err(AppError::Aborted) => {
            log::info!("[Chat] Turn interrupted: {}", session_id);
            let event = ChatEvent::Interrupted {
                session_id: session_id.to_string(),
            };
            (TurnStatus::Interrupted, progress.into_message(true), event)
        }
        Err(e) => {
            log::error!("[Chat] Turn failed for session {}: {}", session_id, e);
            let event = ChatEvent::Failed {
                session_id: session_id.to_string(),
                error: e.to_string(),
            };
            progress.stop_ticker();
            let message = Message::assistant(format!("Sorry, I encountered an error: {e}"));
            (TurnStatus::Failed, message, event)
        }
    };

    messages.push(assistant);
    let session = {
        let sessions = state.sessions.clone();
        let id = session_id.to_string();
        tokio::task::spawn_blocking(move || sessions.save_session(messages, Some(&id)))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
    };

    if let Some(tx) = &events {
        if tx.send(event).is_err() {
            log::debug!("[Chat] Event receiver dropped before the end of turn for {}", session_id);
        }
    }

    Ok(TurnOutcome {
        session_id: session_id.to_string(),
        status,
        session: Some(session),
    })
}

/// The assistant placeholder as it evolves during a turn.
struct TurnProgress {
    session_id: String,
    events: Option<UnboundedSender<ChatEvent>>,
    content: String,
    executions: Vec<ToolExecution>,
    timer: ThinkingTimer,
    ticker: Option<ElapsedTicker>,
}

impl TurnProgress {
    fn new(session_id: &str, events: Option<UnboundedSender<ChatEvent>>) -> Self {
        Self {
            session_id: session_id.to_string(),
            events,
            content: String::new(),
            executions: Vec::new(),
            timer: ThinkingTimer::new(),
            ticker: None,
        }
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                log::debug!("[Chat] Event receiver dropped for session {}", self.session_id);
            }
        }
    }

    fn update(&mut self, content: &str, executions: &[ToolExecution]) {
        self.content = content.to_string();
        self.executions = executions.to_vec();

        let thinking = split_thinking(content).state;
        match self.timer.observe(thinking) {
            TimerTransition::Started(started_at) => self.start_ticker(started_at),
            TimerTransition::Stopped(_) => self.stop_ticker(),
            TimerTransition::None => {}
        }

        self.emit(ChatEvent::Update {
            session_id: self.session_id.clone(),
            content: self.content.clone(),
            tool_executions: self.executions.clone(),
            thinking,
        });
    }

    fn start_ticker(&mut self, started_at: std::time::Instant) {
        let ticker = ElapsedTicker::start(started_at, ElapsedTicker::PERIOD);
        if let Some(tx) = self.events.clone() {
            let mut elapsed = ticker.subscribe();
            let stopped = ticker.stop_token();
            let session_id = self.session_id.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = stopped.cancelled() => break,
                        changed = elapsed.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let seconds = *elapsed.borrow_and_update();
                            let event = ChatEvent::ThinkingElapsed {
                                session_id: session_id.clone(),
                                seconds,
                            };
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
        self.ticker = Some(ticker);
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    /// Final assistant message. The thinking duration is frozen here if the
    /// block never closed.
    fn into_message(mut self, interrupted: bool) -> Message {
        self.stop_ticker();
        let thinking_seconds = self.timer.finish();
        let mut message = Message::assistant(std::mem::take(&mut self.content));
        message.thinking_seconds = thinking_seconds;
        if !self.executions.is_empty() {
            message.tool_executions = Some(std::mem::take(&mut self.executions));
        }
        if interrupted {
            message.interrupted = Some(true);
        }
        message
    }
}
