//! Best-effort e-mail notifications. Delivery is always detached from the
//! request that triggered it: a failed or missing mail is a warn-level log
//! line, never an error surfaced to the actor.

use std::{error::Error as StdError, sync::Arc};

use async_trait::async_trait;
use derive_more::{Display, From};
use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport as _,
};
use tokio::task;

use crate::{config, db::ticket::Status};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), Error>;
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("invalid address: {_0}")]
    Address(lettre::address::AddressError),

    #[display("failed to build message: {_0}")]
    Message(lettre::error::Error),

    #[display("smtp delivery failed: {_0}")]
    Smtp(lettre::transport::smtp::Error),

    #[display("delivery task failed: {_0}")]
    Task(task::JoinError),
}

impl StdError for Error {}

/// SMTP relay delivery.
pub struct Mailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &config::Smtp) -> Result<Self, Error> {
        let mut builder = SmtpTransport::relay(&config.relay)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        Ok(Self {
            transport: builder.build(),
            from: config.from.parse()?,
        })
    }
}

#[async_trait]
impl Notifier for Mailer {
    async fn notify(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), Error> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .body(body.to_string())?;

        // The transport is synchronous; keep it off the async runtime.
        let transport = self.transport.clone();
        task::spawn_blocking(move || transport.send(&message))
            .await?
            .map(drop)
            .map_err(Error::from)
    }
}

/// Used when no `[smtp]` section is configured.
pub struct Disabled;

#[async_trait]
impl Notifier for Disabled {
    async fn notify(
        &self,
        to: &str,
        subject: &str,
        _: &str,
    ) -> Result<(), Error> {
        tracing::debug!(to, subject, "notifications disabled, dropping");
        Ok(())
    }
}

/// Fire-and-forget delivery. Recipients without an address are skipped.
pub fn spawn(
    notifier: Arc<dyn Notifier>,
    to: String,
    subject: String,
    body: String,
) {
    if to.is_empty() {
        tracing::debug!(subject, "recipient has no address, skipping");
        return;
    }
    task::spawn(async move {
        if let Err(e) = notifier.notify(&to, &subject, &body).await {
            tracing::warn!(to, subject, "failed to deliver notification: {e}");
        }
    });
}

/// Message templates for the three lifecycle notifications.
pub mod message {
    use super::Status;

    /// To the requester, right after their ticket is filed.
    pub fn ticket_created(
        name: &str,
        reference: &str,
        title: &str,
    ) -> (String, String) {
        let subject = format!("Ticket created: {reference} - {title}");
        let body = format!(
            "Hello {name},\n\
             \n\
             Your request has been received.\n\
             \n\
             Reference: {reference}\n\
             Title: {title}\n\
             \n\
             A technician will look at it shortly.\n\
             \n\
             Support team",
        );
        (subject, body)
    }

    /// To the requester, when their ticket reaches resolved or closed.
    pub fn status_changed(
        name: &str,
        reference: &str,
        title: &str,
        status: Status,
    ) -> (String, String) {
        let subject = format!("Ticket {reference} update: {status}");
        let body = format!(
            "Hello {name},\n\
             \n\
             Your ticket \"{title}\" is now {status}.\n\
             \n\
             If the problem is solved, nothing else is needed. If it \
             persists, add a comment on the ticket and it will be picked \
             up again.\n\
             \n\
             Support team",
        );
        (subject, body)
    }

    /// To the other side of the conversation, when a comment is posted.
    pub fn new_comment(
        name: &str,
        reference: &str,
        title: &str,
        content: &str,
        from_staff: bool,
    ) -> (String, String) {
        let subject = format!("New message on ticket {reference}");
        let who = if from_staff {
            "The technician replied to your ticket"
        } else {
            "The requester replied to the ticket"
        };
        let body = format!(
            "Hello {name},\n\
             \n\
             {who} \"{title}\".\n\
             \n\
             Comment:\n\
             \"{content}\"\n\
             \n\
             Sign in to the portal to answer.",
        );
        (subject, body)
    }
}
