use serde::{Deserialize, Serialize};

pub use crate::db::user::{Id, PasswordHash, Role};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub role: Role,
}

/// Full account row for the admin user-management surface.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Account {
    pub id: Id,
    pub login: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}
