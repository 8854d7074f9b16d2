use std::collections::HashMap;

use time::OffsetDateTime;
use tokio_postgres::Error;
use uuid::Uuid;

use super::{ticket, user, Client};

/// One message in a ticket's conversation. Append-only.
#[derive(Clone, Debug)]
pub struct Comment {
    pub id: Uuid,
    pub ticket: ticket::Id,
    pub author: user::Id,
    pub content: String,
    pub at: OffsetDateTime,
}

impl Comment {
    pub fn new(
        ticket: ticket::Id,
        author: user::Id,
        content: String,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket,
            author,
            content,
            at,
        }
    }
}

impl Client {
    pub async fn write_comment(&self, comment: &Comment) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO ticket_comments (id, ticket_id, author_id, \
                                         content, at) \
            VALUES ($1, $2, $3, $4, $5)";
        self.0
            .execute(
                SQL,
                &[
                    &comment.id,
                    &comment.ticket,
                    &comment.author,
                    &comment.content,
                    &comment.at,
                ],
            )
            .await
            .map(drop)
    }

    /// Conversations for a page of tickets, in chronological order.
    pub async fn get_comments_for_tickets(
        &self,
        ids: &[ticket::Id],
    ) -> Result<HashMap<ticket::Id, Vec<Comment>>, Error> {
        const SQL: &str = "\
            SELECT id, ticket_id, author_id, content, at \
            FROM ticket_comments \
            WHERE ticket_id IN (SELECT unnest($1::UUID[])) \
            ORDER BY at ASC, \
                     id ASC";

        let mut threads = HashMap::<_, Vec<_>>::new();
        for row in self.0.query(SQL, &[&ids]).await? {
            let comment = Comment {
                id: row.get("id"),
                ticket: row.get("ticket_id"),
                author: row.get("author_id"),
                content: row.get("content"),
                at: row.get("at"),
            };
            threads.entry(comment.ticket).or_default().push(comment);
        }
        Ok(threads)
    }
}
