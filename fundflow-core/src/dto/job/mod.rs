//! Job DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::job::Trigger;

/// Request to create a new job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreateModel {
    pub job_definition_id: String,
    #[serde(default)]
    pub specification_id: Option<String>,
    #[serde(default)]
    pub parent_job_id: Option<Uuid>,
    #[serde(default)]
    pub invoker_user_id: Option<String>,
    #[serde(default)]
    pub invoker_user_display_name: Option<String>,
    #[serde(default)]
    pub item_count: Option<i32>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub message_body: Option<String>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Identity of whoever asked for the work
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerContext {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub correlation_id: Option<String>,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            user_name: Some(user_name.into()),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
