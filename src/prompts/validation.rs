use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::models::prompt::CategoryDef;

/// Parse a JSON prompt catalog and check its structure.
pub fn parse_catalog(raw: &str) -> AppResult<Vec<CategoryDef>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|_| AppError::InvalidRequest("Invalid JSON format".into()))?;
    if !value.is_array() {
        return Err(AppError::InvalidRequest("Root must be an array of categories".into()));
    }

    let catalog: Vec<CategoryDef> = serde_json::from_value(value)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed catalog: {e}")))?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

pub fn validate_catalog(catalog: &[CategoryDef]) -> AppResult<()> {
    let invalid = |msg: String| -> AppResult<()> { Err(AppError::InvalidRequest(msg)) };
    let mut category_ids = HashSet::new();

    for (index, category) in catalog.iter().enumerate() {
        if category.id.trim().is_empty() {
            return invalid(format!("Category at index {index} missing or invalid 'id'"));
        }
        if !category_ids.insert(category.id.as_str()) {
            return invalid(format!("Duplicate category id: {}", category.id));
        }
        if category.name.trim().is_empty() {
            return invalid(format!("Category '{}' missing or invalid 'name'", category.id));
        }

        let mut sub_ids = HashSet::new();
        for (sub_index, sub) in category.sub_categories.iter().enumerate() {
            if sub.id.trim().is_empty() {
                return invalid(format!(
                    "SubCategory at index {sub_index} in category '{}' missing or invalid 'id'",
                    category.id
                ));
            }
            if !sub_ids.insert(sub.id.as_str()) {
                return invalid(format!(
                    "Duplicate subCategory id '{}' in category '{}'",
                    sub.id, category.id
                ));
            }
            if sub.name.trim().is_empty() {
                return invalid(format!(
                    "SubCategory '{}' in category '{}' missing or invalid 'name'",
                    sub.id, category.id
                ));
            }

            for (prompt_index, prompt) in sub.prompts.iter().enumerate() {
                if prompt.name.trim().is_empty() {
                    return invalid(format!(
                        "Prompt at index {prompt_index} in subCategory '{}' missing or invalid 'name'",
                        sub.id
                    ));
                }
                if prompt.content.trim().is_empty() {
                    return invalid(format!(
                        "Prompt '{}' in subCategory '{}' missing or invalid 'content'",
                        prompt.name, sub.id
                    ));
                }
            }
        }
    }

    Ok(())
}
