use std::collections::HashMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardContext {
    pub uid: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub name: Option<String>,
    pub email: Option<String>,
    pub login: Option<String>,
    pub org_id: Option<i64>,
    pub org_name: Option<String>,
    pub org_role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceContext {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uid: String,
}

/// Host-supplied facts prepended to a conversation as system context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub user: Option<UserContext>,
    #[serde(default)]
    pub dashboard: DashboardContext,
    #[serde(default)]
    pub data_sources: Vec<DataSourceContext>,
}

impl ChatContext {
    pub fn format(&self) -> String {
        let mut out = String::new();

        if let Some(user) = self.user.as_ref().filter(|u| u.login.is_some()) {
            let unknown = || "Unknown".to_string();
            let _ = write!(
                out,
                "User: \n-Name: {} \n-Email: {} \n-Role: {} \n\n",
                user.name.clone().unwrap_or_else(unknown),
                user.email.clone().unwrap_or_else(unknown),
                user.org_role.clone().unwrap_or_else(unknown),
            );
        }

        if let Some(uid) = &self.dashboard.uid {
            let _ = write!(
                out,
                "Current Dashboard: \n-Title: {} \n-UID: {} \n\n",
                self.dashboard.title.as_deref().unwrap_or_default(),
                uid
            );
        }

        if !self.data_sources.is_empty() {
            out.push_str("Available Data Sources: \n");
            for ds in &self.data_sources {
                let _ = writeln!(out, "-{} (Type: {}, UID: {}) ", ds.name, ds.kind, ds.uid);
            }
            out.push('\n');
        }

        out
    }
}
