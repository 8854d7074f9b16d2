use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    db::ticket::{Priority, Rating, Status},
    sla::Sla,
};

/// One tabular export row. Spreadsheet/PDF rendering is the caller's
/// concern; this is the data contract only.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub reference: String,
    pub title: String,
    pub category: String,
    pub area: Option<String>,
    pub requester: String,
    pub assignee: Option<String>,
    pub priority: Priority,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub closed: bool,
    /// Hours from creation to closure, only for closed tickets.
    pub hours_to_close: Option<f64>,
    pub rating: Option<Rating>,
    pub sla: Sla,
    pub deadline_hours: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub rows: Vec<Row>,
}
