use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrompt {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    pub created_at: i64,
}

impl UserPrompt {
    pub fn pinned(&self) -> bool {
        self.is_pinned.unwrap_or(false)
    }
}

/// Upsert payload. Pin state is only changed through the pin toggle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveUserPromptRequest {
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDef {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCategoryDef {
    pub id: String,
    pub name: String,
    pub prompts: Vec<PromptDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDef {
    pub id: String,
    pub name: String,
    pub sub_categories: Vec<SubCategoryDef>,
}

/// Category name -> sub-category name -> prompt contents, in catalog order.
pub type PreConfiguredPrompts = Vec<(String, Vec<(String, Vec<String>)>)>;
