//! Network resource handler
//!
//! Tracks the asynchronous operations a network source can require before
//! it plays: mounting the enclosing volume and prompting for credentials.
//! Each operation is identified by a ticket so completions that arrive
//! after a cancel or close are recognized as stale.

use crate::engine::{Credentials, MediaSource, SourceId};
use tracing::{debug, info};

/// Identity of one mount operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountTicket(pub u64);

/// Identity of one credential prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptTicket(pub u64);

/// Answer to a credential prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialReply {
    Provided(Credentials),
    Aborted,
}

#[derive(Debug, Clone, Copy)]
struct MountInFlight {
    ticket: MountTicket,
    source: SourceId,
}

#[derive(Debug, Clone, Copy)]
struct PromptInFlight {
    ticket: PromptTicket,
    source: SourceId,
}

/// Per-session network state
///
/// A session is one user-opened source. Internal reopens (after a mount)
/// keep the session, so an aborted prompt is not asked again.
#[derive(Debug, Default)]
pub struct NetworkHandler {
    next_ticket: u64,
    mount: Option<MountInFlight>,
    prompt: Option<PromptInFlight>,
    auth_aborted: bool,
    credentials: Option<Credentials>,
}

/// Schemes whose sources accept embedded credentials
const CREDENTIAL_SCHEMES: &[&str] = &["http", "https", "rtsp", "rtsps", "rtspt", "rtsph"];

pub fn accepts_credentials(source: &MediaSource) -> bool {
    source
        .scheme()
        .is_some_and(|scheme| CREDENTIAL_SCHEMES.contains(&scheme.as_str()))
}

impl NetworkHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    pub fn mount_pending(&self) -> bool {
        self.mount.is_some()
    }

    pub fn prompt_pending(&self) -> bool {
        self.prompt.is_some()
    }

    pub fn auth_aborted(&self) -> bool {
        self.auth_aborted
    }

    /// Start a mount, replacing any mount in flight
    ///
    /// Returns the new ticket and the ticket of the replaced mount.
    pub fn begin_mount(&mut self, source: SourceId) -> (MountTicket, Option<MountTicket>) {
        let replaced = self.mount.take().map(|m| {
            debug!("Cancelling mount {:?} in flight", m.ticket);
            m.ticket
        });
        let ticket = MountTicket(self.next());
        self.mount = Some(MountInFlight { ticket, source });
        (ticket, replaced)
    }

    /// Finish a mount; `false` for stale tickets
    pub fn finish_mount(&mut self, ticket: MountTicket, current: Option<SourceId>) -> bool {
        match self.mount {
            Some(m) if m.ticket == ticket && Some(m.source) == current => {
                self.mount = None;
                true
            }
            _ => {
                debug!("Ignoring stale mount completion {:?}", ticket);
                false
            }
        }
    }

    /// Start a credential prompt
    ///
    /// `None` when the user already aborted this session or a prompt is
    /// outstanding.
    pub fn begin_prompt(&mut self, source: SourceId) -> Option<PromptTicket> {
        if self.auth_aborted {
            debug!("Not authenticating, the user aborted the last auth attempt");
            return None;
        }
        if self.prompt.is_some() {
            debug!("Authentication already in progress");
            return None;
        }
        let ticket = PromptTicket(self.next());
        self.prompt = Some(PromptInFlight { ticket, source });
        Some(ticket)
    }

    /// Record a prompt reply
    ///
    /// Returns the credentials to hand to the engine (`Some(None)` after an
    /// abort), or `None` for stale tickets.
    pub fn finish_prompt(
        &mut self,
        ticket: PromptTicket,
        current: Option<SourceId>,
        reply: CredentialReply,
    ) -> Option<Option<Credentials>> {
        match self.prompt {
            Some(p) if p.ticket == ticket && Some(p.source) == current => {
                self.prompt = None;
            }
            _ => {
                debug!("Ignoring stale credential reply {:?}", ticket);
                return None;
            }
        }

        match reply {
            CredentialReply::Provided(credentials) => {
                info!("Got credentials for user '{}'", credentials.username);
                self.credentials = Some(credentials);
            }
            CredentialReply::Aborted => {
                info!("Authentication aborted by the user");
                self.auth_aborted = true;
            }
        }
        Some(self.credentials.clone())
    }

    /// Cancel outstanding operations, returning their tickets
    pub fn cancel_all(&mut self) -> (Option<MountTicket>, Option<PromptTicket>) {
        (
            self.mount.take().map(|m| m.ticket),
            self.prompt.take().map(|p| p.ticket),
        )
    }

    /// Start a new session (user-initiated open)
    pub fn reset_session(&mut self) {
        self.auth_aborted = false;
        self.credentials = None;
    }
}
