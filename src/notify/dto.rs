use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A reminder for one occurrence of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub date: NaiveDate,
    pub is_generated_instance: bool,
}

/// Body POSTed to the push webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub kind: &'static str,
    pub notification: &'a Notification,
}
