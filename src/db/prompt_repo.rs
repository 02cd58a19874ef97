use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::clock::{Clock, SystemClock};
use crate::db::kv_store::{
    load_json_list, store_json_list, KeyValueStore, WriteLock, PINNED_PRECONFIGURED_KEY,
    USER_PROMPTS_KEY,
};
use crate::error::{AppError, AppResult};
use crate::models::prompt::{CategoryDef, PreConfiguredPrompts, SaveUserPromptRequest, UserPrompt};
use crate::models::session::PinToggle;
use crate::prompts::catalog::builtin_catalog;

pub const PIN_LIMIT: usize = 20;

/// User-authored prompts plus pinned references into a read-only catalog.
///
/// Pre-configured pins are keyed by prompt content, so identical content in
/// two sub-categories shares one pin.
#[derive(Clone)]
pub struct PromptLibrary {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    catalog: Arc<Vec<CategoryDef>>,
    pin_limit: usize,
    writes: WriteLock,
}

impl PromptLibrary {
    /// An empty or absent catalog falls back to the built-in one.
    pub fn new(kv: Arc<dyn KeyValueStore>, catalog: Option<Vec<CategoryDef>>) -> Self {
        Self::with_clock(kv, catalog, Arc::new(SystemClock))
    }

    pub fn with_clock(
        kv: Arc<dyn KeyValueStore>,
        catalog: Option<Vec<CategoryDef>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = match catalog {
            Some(c) if !c.is_empty() => c,
            _ => builtin_catalog(),
        };
        Self {
            kv,
            clock,
            catalog: Arc::new(catalog),
            pin_limit: PIN_LIMIT,
            writes: WriteLock::default(),
        }
    }

    pub fn with_pin_limit(mut self, pin_limit: usize) -> Self {
        self.pin_limit = pin_limit;
        self
    }

    pub fn catalog(&self) -> &[CategoryDef] {
        &self.catalog
    }

    pub fn get_pre_configured_prompts(&self) -> PreConfiguredPrompts {
        self.catalog
            .iter()
            .map(|cat| {
                let subs = cat
                    .sub_categories
                    .iter()
                    .map(|sub| {
                        let contents = sub.prompts.iter().map(|p| p.content.clone()).collect();
                        (sub.name.clone(), contents)
                    })
                    .collect();
                (cat.name.clone(), subs)
            })
            .collect()
    }

    pub fn get_user_prompts(&self) -> Vec<UserPrompt> {
        load_json_list(self.kv.as_ref(), USER_PROMPTS_KEY, "user prompts")
    }

    fn store_user_prompts(&self, prompts: &[UserPrompt]) {
        store_json_list(self.kv.as_ref(), USER_PROMPTS_KEY, prompts, "user prompts");
    }

    /// Upsert keyed by id. Updates keep `createdAt` and pin state; an id that
    /// no longer exists is saved as a new prompt with a fresh id.
    pub fn save_user_prompt(&self, req: SaveUserPromptRequest) -> UserPrompt {
        let _guard = self.writes.acquire();
        let mut prompts = self.get_user_prompts();

        let existing = req
            .id
            .as_deref()
            .and_then(|id| prompts.iter_mut().find(|p| p.id == id));

        let saved = match existing {
            Some(prompt) => {
                prompt.title = req.title;
                prompt.content = req.content;
                prompt.category = req.category;
                prompt.clone()
            }
            None => {
                let now = self.clock.now_millis();
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                let prompt = UserPrompt {
                    id: format!("{}{}", now, &suffix[..7]),
                    title: req.title,
                    content: req.content,
                    category: req.category,
                    is_pinned: Some(false),
                    created_at: now,
                };
                prompts.push(prompt.clone());
                prompt
            }
        };

        self.store_user_prompts(&prompts);
        saved
    }

    pub fn delete_user_prompt(&self, id: &str) {
        let _guard = self.writes.acquire();
        let mut prompts = self.get_user_prompts();
        prompts.retain(|p| p.id != id);
        self.store_user_prompts(&prompts);
    }

    pub fn toggle_pin(&self, id: &str) -> AppResult<PinToggle> {
        let _guard = self.writes.acquire();
        let mut prompts = self.get_user_prompts();
        let pinned_count = prompts.iter().filter(|p| p.pinned()).count();

        let prompt = prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Prompt {id} not found")))?;

        let toggle = if prompt.pinned() {
            prompt.is_pinned = Some(false);
            PinToggle::Unpinned
        } else {
            if pinned_count >= self.pin_limit {
                return Err(AppError::PinLimitReached { limit: self.pin_limit });
            }
            prompt.is_pinned = Some(true);
            PinToggle::Pinned
        };

        self.store_user_prompts(&prompts);
        Ok(toggle)
    }

    pub fn get_pinned_prompts(&self) -> Vec<UserPrompt> {
        self.get_user_prompts().into_iter().filter(|p| p.pinned()).collect()
    }

    /// Distinct categories in use, sorted.
    pub fn get_categories(&self) -> Vec<String> {
        self.get_user_prompts()
            .into_iter()
            .filter_map(|p| p.category)
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Pinned first, then newest first.
    pub fn get_user_prompts_sorted(&self) -> Vec<UserPrompt> {
        let mut prompts = self.get_user_prompts();
        prompts.sort_by(|a, b| {
            b.pinned()
                .cmp(&a.pinned())
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        prompts
    }

    pub fn get_pinned_pre_configured_prompts(&self) -> Vec<String> {
        load_json_list(
            self.kv.as_ref(),
            PINNED_PRECONFIGURED_KEY,
            "pinned preconfigured prompts",
        )
    }

    pub fn toggle_pre_configured_pin(&self, content: &str) -> AppResult<PinToggle> {
        let _guard = self.writes.acquire();
        let mut pinned = self.get_pinned_pre_configured_prompts();

        let toggle = if pinned.iter().any(|p| p == content) {
            pinned.retain(|p| p != content);
            PinToggle::Unpinned
        } else {
            if pinned.len() >= self.pin_limit {
                return Err(AppError::PinLimitReached { limit: self.pin_limit });
            }
            pinned.push(content.to_string());
            PinToggle::Pinned
        };

        store_json_list(
            self.kv.as_ref(),
            PINNED_PRECONFIGURED_KEY,
            &pinned,
            "pinned preconfigured prompts",
        );
        Ok(toggle)
    }

    pub fn is_pre_configured_prompt_pinned(&self, content: &str) -> bool {
        self.get_pinned_pre_configured_prompts().iter().any(|p| p == content)
    }
}
