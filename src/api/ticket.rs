use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::api;

pub use crate::{
    db::ticket::{Id, Priority, Rating, Status},
    sla::Sla,
};

/// Everything the presentation layer needs for one ticket: resolved names,
/// fresh SLA classification, audit timeline (newest first) and the comment
/// thread (oldest first).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub category: String,
    pub area: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub requester: api::User,
    pub assignee: Option<api::User>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub closed: bool,
    pub rating: Option<Rating>,
    pub rating_comment: Option<String>,
    pub sla: Sla,
    pub deadline_hours: f64,
    pub history: Vec<AuditRecord>,
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub actor: String,
    pub action: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub tickets: Vec<Ticket>,
    pub total_count: usize,
}
