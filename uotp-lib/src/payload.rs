//! Per-opcode payloads.
//!
//! Each opcode owns one type implementing [`Body`]; [`Payload`] is the closed
//! union the packet codec carries. Requests use [`Body::encode_request`],
//! server replies are parsed with [`Body::decode`]. [`Body::encode_reply`]
//! produces the server-side layout and exists for fixture servers.

use crate::constants::{OID_DIGITS, SEED_SIZE};
use crate::error::{UotpError, ensure_len};
use crate::history::History;
use crate::packet::OpCode;
use crate::text::{ascii_field, decimal_field, decode_legacy, encode_legacy, push_left};

/// Wire behaviour shared by every opcode payload.
pub trait Body: Sized {
    const OPCODE: OpCode;

    /// Whether requests start with the common device header
    const NEEDS_COMMON_HEADER: bool = true;

    /// Request-side encoding. Most requests carry no fields of their own.
    fn encode_request(&self, _out: &mut Vec<u8>) {}

    /// Parse a decrypted reply body.
    fn decode(data: &[u8]) -> Result<Self, UotpError>;

    /// Reply-side encoding, the inverse of [`Body::decode`].
    fn encode_reply(&self, out: &mut Vec<u8>);
}

/// Server clock (opcode 407)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSync {
    /// Server time in protocol epoch seconds
    pub time: u32,
}

impl Body for TimeSync {
    const OPCODE: OpCode = OpCode::Time;
    const NEEDS_COMMON_HEADER: bool = false;

    fn decode(data: &[u8]) -> Result<Self, UotpError> {
        ensure_len(data, 4)?;
        Ok(Self {
            time: u32::from_be_bytes(data[..4].try_into()?),
        })
    }

    fn encode_reply(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.time.to_be_bytes());
    }
}

/// Issued account (opcode 451)
///
/// Reply layout:
/// - 0..20: serial number (space padded)
/// - 20..31: OID, decimal
/// - 31..71: seed, 40 hex chars
/// - 71..135: user hash, kept verbatim
/// - 135..215: issuance info (space padded)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Issue {
    pub serial_number: String,
    pub oid: u64,
    pub seed: [u8; SEED_SIZE],
    pub user_hash: String,
    pub issue_info: String,
}

impl Issue {
    pub const REPLY_SIZE: usize = 20 + OID_DIGITS + 2 * SEED_SIZE + 64 + 80;
}

impl Body for Issue {
    const OPCODE: OpCode = OpCode::Issue;

    fn decode(data: &[u8]) -> Result<Self, UotpError> {
        ensure_len(data, Self::REPLY_SIZE)?;

        let mut seed = [0u8; SEED_SIZE];
        hex::decode_to_slice(&data[31..71], &mut seed)
            .map_err(|e| UotpError::InvalidPacket(format!("seed is not hex: {e}")))?;

        Ok(Self {
            serial_number: ascii_field(data, 0..20, "serial number")?.trim().to_string(),
            oid: decimal_field(data, 20..31, "oid")?,
            seed,
            user_hash: ascii_field(data, 71..135, "user hash")?.to_string(),
            issue_info: decode_legacy(&data[135..215]).trim().to_string(),
        })
    }

    fn encode_reply(&self, out: &mut Vec<u8>) {
        push_left(out, self.serial_number.as_bytes(), 20);
        out.extend_from_slice(format!("{:011}", self.oid).as_bytes());
        out.extend_from_slice(hex::encode(self.seed).as_bytes());
        push_left(out, self.user_hash.as_bytes(), 64);
        push_left(out, &encode_legacy(&self.issue_info), 80);
    }
}

/// Account information (opcode 402)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Information {
    pub oid: u64,
    pub seed_label: String,
    pub partner: String,
}

impl Information {
    pub const REPLY_SIZE: usize = OID_DIGITS + 40 + 80;
}

impl Body for Information {
    const OPCODE: OpCode = OpCode::Information;

    fn decode(data: &[u8]) -> Result<Self, UotpError> {
        ensure_len(data, Self::REPLY_SIZE)?;
        Ok(Self {
            oid: decimal_field(data, 0..11, "oid")?,
            seed_label: String::from_utf8_lossy(&data[11..51]).trim().to_string(),
            partner: String::from_utf8_lossy(&data[51..131]).trim().to_string(),
        })
    }

    fn encode_reply(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(format!("{:011}", self.oid).as_bytes());
        push_left(out, self.seed_label.as_bytes(), 40);
        push_left(out, self.partner.as_bytes(), 80);
    }
}

/// Error counter reset (opcode 452). The reply carries nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetErrorCount;

impl Body for ResetErrorCount {
    const OPCODE: OpCode = OpCode::ResetErrorCount;

    fn decode(_data: &[u8]) -> Result<Self, UotpError> {
        Ok(Self)
    }

    fn encode_reply(&self, _out: &mut Vec<u8>) {}
}

/// Help messages (opcode 454)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Help {
    pub messages: Vec<String>,
}

impl Help {
    /// Trailing bytes after the message text
    pub const TRAILER_SIZE: usize = 8;
}

impl Body for Help {
    const OPCODE: OpCode = OpCode::Help;

    fn decode(data: &[u8]) -> Result<Self, UotpError> {
        ensure_len(data, Self::TRAILER_SIZE)?;
        let text = decode_legacy(&data[..data.len() - Self::TRAILER_SIZE]);
        Ok(Self {
            messages: text.split('|').map(str::to_string).collect(),
        })
    }

    fn encode_reply(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&encode_legacy(&self.messages.join("|")));
        out.resize(out.len() + Self::TRAILER_SIZE, b' ');
    }
}

/// Payload of a packet, one variant per opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Time(TimeSync),
    Issue(Issue),
    Information(Information),
    ResetErrorCount(ResetErrorCount),
    History(History),
    Help(Help),
}

macro_rules! with_body {
    ($payload:expr, $body:ident => $expr:expr) => {
        match $payload {
            Payload::Time($body) => $expr,
            Payload::Issue($body) => $expr,
            Payload::Information($body) => $expr,
            Payload::ResetErrorCount($body) => $expr,
            Payload::History($body) => $expr,
            Payload::Help($body) => $expr,
        }
    };
}

fn opcode_of<B: Body>(_: &B) -> OpCode {
    B::OPCODE
}

fn needs_header_of<B: Body>(_: &B) -> bool {
    B::NEEDS_COMMON_HEADER
}

impl Payload {
    /// Empty request payload for an opcode.
    pub fn request(opcode: OpCode) -> Self {
        match opcode {
            OpCode::Time => Payload::Time(TimeSync::default()),
            OpCode::Issue => Payload::Issue(Issue::default()),
            OpCode::Information => Payload::Information(Information::default()),
            OpCode::ResetErrorCount => Payload::ResetErrorCount(ResetErrorCount),
            OpCode::UseHistory => Payload::History(History::default()),
            OpCode::Help => Payload::Help(Help::default()),
        }
    }

    pub fn opcode(&self) -> OpCode {
        with_body!(self, body => opcode_of(body))
    }

    pub fn needs_common_header(&self) -> bool {
        with_body!(self, body => needs_header_of(body))
    }

    pub fn encode_request(&self, out: &mut Vec<u8>) {
        with_body!(self, body => body.encode_request(out))
    }

    pub fn encode_reply(&self, out: &mut Vec<u8>) {
        with_body!(self, body => body.encode_reply(out))
    }

    /// Parse a decrypted reply body for `opcode`.
    pub fn decode(opcode: OpCode, data: &[u8]) -> Result<Self, UotpError> {
        Ok(match opcode {
            OpCode::Time => Payload::Time(TimeSync::decode(data)?),
            OpCode::Issue => Payload::Issue(Issue::decode(data)?),
            OpCode::Information => Payload::Information(Information::decode(data)?),
            OpCode::ResetErrorCount => Payload::ResetErrorCount(ResetErrorCount::decode(data)?),
            OpCode::UseHistory => Payload::History(History::decode(data)?),
            OpCode::Help => Payload::Help(Help::decode(data)?),
        })
    }
}
