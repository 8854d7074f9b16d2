use std::collections::HashMap;

use time::OffsetDateTime;
use tokio_postgres::Error;
use uuid::Uuid;

use super::{ticket, user, Client};

/// One immutable line of a ticket's timeline. Written together with the
/// mutation that produced it, never updated or deleted afterwards.
#[derive(Clone, Debug)]
pub struct AuditEntry {
    pub id: Uuid,
    pub ticket: ticket::Id,
    pub actor: user::Id,
    pub action: String,
    pub at: OffsetDateTime,
}

impl AuditEntry {
    pub fn new(
        ticket: ticket::Id,
        actor: user::Id,
        action: String,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket,
            actor,
            action,
            at,
        }
    }
}

impl Client {
    /// Timelines for a page of tickets, newest entries first.
    pub async fn get_audit_for_tickets(
        &self,
        ids: &[ticket::Id],
    ) -> Result<HashMap<ticket::Id, Vec<AuditEntry>>, Error> {
        const SQL: &str = "\
            SELECT id, ticket_id, actor_id, action, at \
            FROM ticket_audit \
            WHERE ticket_id IN (SELECT unnest($1::UUID[])) \
            ORDER BY at DESC, \
                     id DESC";

        let mut timelines = HashMap::<_, Vec<_>>::new();
        for row in self.0.query(SQL, &[&ids]).await? {
            let entry = AuditEntry {
                id: row.get("id"),
                ticket: row.get("ticket_id"),
                actor: row.get("actor_id"),
                action: row.get("action"),
                at: row.get("at"),
            };
            timelines.entry(entry.ticket).or_default().push(entry);
        }
        Ok(timelines)
    }
}
