//! Authorization guard: who may do what, resolved from the single stored
//! role. Checks that need ticket context (requester identity, current
//! status) take it explicitly so the rules stay pure and testable.

use crate::db::{ticket::Status, user::Role};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    CreateTicket,
    TakeTicket,
    AdvanceStatus,
    AdvancePriority,
    ManageCatalog,
    ManageUsers,
    ViewReports,
}

/// Role-level permission check. Queue operations deliberately ignore
/// assignment: any tech may take or mutate any ticket, so technicians can
/// cover for each other.
pub fn allows(role: Role, action: Action) -> bool {
    match action {
        Action::CreateTicket => true,
        Action::TakeTicket
        | Action::AdvanceStatus
        | Action::AdvancePriority => matches!(role, Role::Tech | Role::Admin),
        Action::ManageCatalog | Action::ManageUsers | Action::ViewReports => {
            matches!(role, Role::Admin)
        }
    }
}

/// Only the requester may rate, and only once the ticket reached a
/// terminal-facing status.
pub fn can_rate(is_requester: bool, status: Status) -> bool {
    is_requester && matches!(status, Status::Resolved | Status::Closed)
}

/// The conversation is between the requester and the staff side.
pub fn can_comment(role: Role, is_requester: bool) -> bool {
    is_requester || matches!(role, Role::Tech | Role::Admin)
}
