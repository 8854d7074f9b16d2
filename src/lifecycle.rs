//! Ticket lifecycle: the transition rules and the entity mutators built on
//! them. Everything here is pure; the clock always arrives as a parameter
//! and persistence is the caller's problem.

use time::OffsetDateTime;

use crate::db::{
    ticket::{Priority, Rating, Status, Ticket},
    user,
};

/// Single step of the fixed forward cycle:
/// new → in-progress → resolved → closed → in-progress.
///
/// Advancing a closed ticket reopens it, so the cycle never terminates.
pub fn next_status(current: Status) -> Status {
    match current {
        Status::New => Status::InProgress,
        Status::InProgress => Status::Resolved,
        Status::Resolved => Status::Closed,
        Status::Closed => Status::InProgress,
    }
}

/// Single step of the priority cycle, wrapping after critical.
pub fn next_priority(current: Priority) -> Priority {
    match current {
        Priority::Low => Priority::Medium,
        Priority::Medium => Priority::High,
        Priority::High => Priority::Critical,
        Priority::Critical => Priority::Low,
    }
}

/// Advances the ticket's status one step, keeping the closure timestamp in
/// lockstep: set on entering closed, cleared on any other target.
///
/// Returns the `(from, to)` pair for the audit trail.
pub fn advance_status(
    ticket: &mut Ticket,
    now: OffsetDateTime,
) -> (Status, Status) {
    let from = ticket.status;
    let to = next_status(from);

    ticket.status = to;
    ticket.closed_at = match to {
        Status::Closed => Some(now),
        _ => None,
    };
    ticket.updated_at = now;

    (from, to)
}

/// Cycles the ticket's priority one step. Returns `(from, to)`.
pub fn advance_priority(
    ticket: &mut Ticket,
    now: OffsetDateTime,
) -> (Priority, Priority) {
    let from = ticket.priority;
    let to = next_priority(from);

    ticket.priority = to;
    ticket.updated_at = now;

    (from, to)
}

/// Assigns the ticket to `tech` and puts it in progress. Reassignment over
/// an existing assignee is allowed (last write wins between racing techs);
/// the previous assignee is returned for the audit text. Taking a closed
/// ticket reopens it, clearing the closure timestamp.
pub fn take(
    ticket: &mut Ticket,
    tech: user::Id,
    now: OffsetDateTime,
) -> Option<user::Id> {
    let previous = ticket.assignee.replace(tech);

    ticket.status = Status::InProgress;
    ticket.closed_at = None;
    ticket.updated_at = now;

    previous
}

/// Records the requester's satisfaction score. Rating a resolved ticket
/// closes it. Callers must have checked `access::can_rate` first.
pub fn rate(
    ticket: &mut Ticket,
    score: Rating,
    comment: Option<String>,
    now: OffsetDateTime,
) {
    ticket.rating = Some(score);
    ticket.rating_comment = comment;

    if ticket.status == Status::Resolved {
        ticket.status = Status::Closed;
        ticket.closed_at = Some(now);
    }
    ticket.updated_at = now;
}
