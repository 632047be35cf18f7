//! Account session.
//!
//! A [`Session`] owns the account state and drives every server operation.
//! It starts Unissued (no seed) and becomes Active after [`Session::issue`].
//! Authenticated operations need an Active session and fail with
//! [`UotpError::NotIssued`] before touching the network otherwise.
//!
//! Every network operation takes a [`CancellationToken`] scoped to that call.
//! A cancelled call leaves the session usable with a fresh token.

use crate::account::{Account, AccountRecord, Seed};
use crate::clock::{Clock, SystemClock};
use crate::error::UotpError;
use crate::history::History;
use crate::packet::{OpCode, Packet};
use crate::payload::{Information, Payload};
use crate::text::group_chars;
use crate::token::{adjusted_now, display_token, token_code};
use crate::transport::Transport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Largest page number the 4-digit request field can carry
const MAX_HISTORY_PAGE: u16 = 9999;

pub struct Session<T, C = SystemClock> {
    transport: T,
    clock: C,
    account: Account,
}

impl<T: Transport> Session<T> {
    /// Unissued session on the local wall clock.
    pub fn new(transport: T) -> Self {
        Self::with_clock(transport, SystemClock, Account::default())
    }

    /// Session restored from a persisted record.
    pub fn from_record(transport: T, record: &AccountRecord) -> Result<Self, UotpError> {
        Ok(Self::with_clock(transport, SystemClock, Account::try_from(record)?))
    }
}

impl<T: Transport, C: Clock> Session<T, C> {
    pub fn with_clock(transport: T, clock: C, account: Account) -> Self {
        Self {
            transport,
            clock,
            account,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Persistable form of the current account.
    pub fn record(&self) -> AccountRecord {
        self.account.to_record()
    }

    pub fn serial_number(&self) -> &str {
        &self.account.serial_number
    }

    pub fn is_issued(&self) -> bool {
        self.account.is_issued()
    }

    pub fn time_diff(&self) -> i64 {
        self.account.time_diff
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Local protocol time corrected by the server offset.
    fn now(&self) -> u32 {
        adjusted_now(self.clock.now(), self.account.time_diff)
    }

    fn seed(&self) -> Result<&Seed, UotpError> {
        self.account.seed.as_ref().ok_or(UotpError::NotIssued)
    }

    /// Current raw 7-digit token.
    pub fn token_code(&self) -> Result<String, UotpError> {
        Ok(token_code(self.account.oid, self.seed()?.as_bytes(), self.now()))
    }

    /// Current token in display form, e.g. `123-4567`.
    pub fn generate_token(&self) -> Result<String, UotpError> {
        Ok(display_token(&self.token_code()?))
    }

    async fn send(&self, packet: Packet, cancel: &CancellationToken) -> Result<Packet, UotpError> {
        let opcode = packet.opcode();
        let key = packet.request_key()?;
        let frame = packet.encode()?;

        let body = self.transport.exchange(frame, cancel).await?;
        let reply = Packet::decode(&body, key.as_deref())?;

        if reply.opcode() != opcode {
            return Err(UotpError::InvalidPacket(format!(
                "expected a {opcode} reply, got {}",
                reply.opcode()
            )));
        }
        Ok(reply)
    }

    /// Request carrying the account id and the current token.
    fn authenticated(&self, payload: Payload) -> Result<Packet, UotpError> {
        let code = self.token_code()?;
        let mut packet = Packet::new(payload);
        packet.oid = self.account.oid;
        packet.set_encryption_info(Some(self.account.id.as_bytes()), Some(&code));
        Ok(packet)
    }

    /// Measure the offset between the server clock and the local one.
    pub async fn sync_time(&mut self, cancel: &CancellationToken) -> Result<(), UotpError> {
        let local = self.clock.now();
        let reply = self.send(Packet::new(Payload::request(OpCode::Time)), cancel).await?;

        let Payload::Time(time) = reply.payload else {
            return Err(UotpError::InvalidPacket("time reply without time payload".to_string()));
        };
        self.account.time_diff = time.time as i64 - local as i64;
        info!("Time synced, server is {}s ahead", self.account.time_diff);
        Ok(())
    }

    /// Register a new account, replacing any existing one.
    pub async fn issue(&mut self, cancel: &CancellationToken) -> Result<(), UotpError> {
        let reply = self.send(Packet::issue_request(self.clock.now()), cancel).await?;

        let Payload::Issue(issue) = reply.payload else {
            return Err(UotpError::InvalidPacket("issue reply without issue payload".to_string()));
        };
        self.account = Account {
            id: issue.user_hash,
            oid: issue.oid,
            seed: Some(Seed::from_bytes(issue.seed)),
            serial_number: group_chars(&issue.serial_number, "-", 4, None),
            time_diff: 0,
        };
        info!("Issued account with serial {}", self.account.serial_number);
        Ok(())
    }

    /// Clear the server-side failed-verification counter.
    pub async fn reset_error_count(&self, cancel: &CancellationToken) -> Result<(), UotpError> {
        let packet = self.authenticated(Payload::request(OpCode::ResetErrorCount))?;
        self.send(packet, cancel).await?;
        debug!("Error count reset");
        Ok(())
    }

    /// Same as [`Session::reset_error_count`].
    pub async fn reset_error(&self, cancel: &CancellationToken) -> Result<(), UotpError> {
        self.reset_error_count(cancel).await
    }

    /// Fetch a 1-based page of usage history.
    pub async fn history(&self, page: u16, cancel: &CancellationToken) -> Result<History, UotpError> {
        if page < 1 || page > MAX_HISTORY_PAGE {
            return Err(UotpError::InvalidArgument(format!(
                "history page must be between 1 and {MAX_HISTORY_PAGE}, got {page}"
            )));
        }
        let packet = self.authenticated(Payload::History(History::request(page)))?;

        match self.send(packet, cancel).await?.payload {
            Payload::History(history) => Ok(history),
            _ => Err(UotpError::InvalidPacket("history reply without history payload".to_string())),
        }
    }

    /// Account information as the server sees it.
    pub async fn information(&self, cancel: &CancellationToken) -> Result<Information, UotpError> {
        let packet = self.authenticated(Payload::request(OpCode::Information))?;

        match self.send(packet, cancel).await?.payload {
            Payload::Information(info) => Ok(info),
            _ => Err(UotpError::InvalidPacket("information reply without information payload".to_string())),
        }
    }

    /// Server help messages. Needs no account.
    pub async fn help(&self, cancel: &CancellationToken) -> Result<Vec<String>, UotpError> {
        match self.send(Packet::new(Payload::request(OpCode::Help)), cancel).await?.payload {
            Payload::Help(help) => Ok(help.messages),
            _ => Err(UotpError::InvalidPacket("help reply without help payload".to_string())),
        }
    }
}
