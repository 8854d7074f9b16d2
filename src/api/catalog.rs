use serde::{Deserialize, Serialize};

use crate::db::{area, category, faq};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: category::Id,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub ticket_count: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: area::Id,
    pub name: String,
    pub description: String,
    pub active: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: faq::Id,
    pub question: String,
    pub answer: String,
}
