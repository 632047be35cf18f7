//! Frame codec.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! 'S' | body length (5 digits) | shared key (64, right-justified) | status (4) | opcode (3) | payload
//! ```
//!
//! The body length counts everything after the 6-byte length header. Request
//! payloads may start with a 42-byte common device header and end with an
//! 8-byte extra token; the whole payload is encrypted when a request key exists.

use crate::constants::{
    BODY_LENGTH_DIGITS, CARRIER_TAG_WIDTH, CLIENT_FLAGS, CLIENT_TAG, CLIENT_VERSION, COMMON_HEADER_SIZE,
    DEVICE_MODEL_WIDTH, DEVICE_PROFILES, FRAME_MARKER, LENGTH_HEADER_SIZE, MAX_BODY_SIZE, MIN_BODY_SIZE,
    OID_DIGITS, OPCODE_DIGITS, SHARED_KEY_FIELD_SIZE, STATUS_OK, STATUS_SIZE, TOKEN_DIGITS,
};
use crate::envelope::{combine_key, decrypt, encrypt, new_shared_key};
use crate::error::{UotpError, ensure_len};
use crate::payload::Payload;
use crate::text::{ascii_field, decimal_field, decode_legacy, push_left, push_right};
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use strum_macros::Display;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum OpCode {
    Information = 402,
    Time = 407,
    Issue = 451,
    ResetErrorCount = 452,
    UseHistory = 453,
    Help = 454,
}

/// 4-character status field. Anything but `0000` is a server error.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status([u8; STATUS_SIZE]);

impl Status {
    pub const OK: Status = Status(*STATUS_OK);

    pub fn from_bytes(bytes: [u8; STATUS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Status from text, right-justified in the 4-byte field.
    pub fn from_text(text: &str) -> Result<Self, UotpError> {
        if text.len() > STATUS_SIZE {
            return Err(UotpError::InvalidArgument(format!("status {text:?} is longer than {STATUS_SIZE}")));
        }
        let mut field = Vec::with_capacity(STATUS_SIZE);
        push_right(&mut field, text.as_bytes(), STATUS_SIZE);
        Ok(Self(field.as_slice().try_into()?))
    }

    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    pub fn as_bytes(&self) -> &[u8; STATUS_SIZE] {
        &self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({self})")
    }
}

/// A request or reply with its encryption context.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub status: Status,
    pub payload: Payload,
    /// Account OID for the common header, 0 when none
    pub oid: u64,
    /// ASCII content of the shared key field
    pub shared_key: Bytes,
    /// 8-byte proof of possession appended to request payloads
    pub extra_token: Bytes,
}

impl Packet {
    /// Packet with status OK and no encryption context.
    pub fn new(payload: Payload) -> Self {
        Self {
            status: Status::OK,
            payload,
            oid: 0,
            shared_key: Bytes::new(),
            extra_token: Bytes::new(),
        }
    }

    /// Issuance request carrying a fresh shared key for `epoch`.
    pub fn issue_request(epoch: u32) -> Self {
        let mut packet = Self::new(Payload::request(OpCode::Issue));
        packet.shared_key = Bytes::from(new_shared_key(epoch));
        packet
    }

    pub fn opcode(&self) -> OpCode {
        self.payload.opcode()
    }

    /// Set the shared key and the token proving possession of the account.
    ///
    /// `None` leaves the current value untouched. The token is right-justified
    /// to 7 characters and followed by a space.
    pub fn set_encryption_info(&mut self, shared_key: Option<&[u8]>, extra_token: Option<&str>) {
        if let Some(key) = shared_key {
            self.shared_key = Bytes::copy_from_slice(key);
        }
        if let Some(token) = extra_token.filter(|t| !t.is_empty()) {
            self.extra_token = Bytes::from(format!("{token:>width$} ", width = TOKEN_DIGITS));
        }
    }

    /// Cipher key input for this request, if any.
    pub fn request_key(&self) -> Result<Option<Vec<u8>>, UotpError> {
        match (self.shared_key.is_empty(), self.extra_token.is_empty()) {
            (true, _) => Ok(None),
            (false, true) => Ok(Some(self.shared_key.to_vec())),
            (false, false) => combine_key(&self.shared_key, &self.extra_token).map(Some),
        }
    }

    /// Encode as a request frame.
    pub fn encode(&self) -> Result<Bytes, UotpError> {
        let mut body = Vec::new();
        if self.payload.needs_common_header() {
            body.extend_from_slice(&common_header(self.oid));
        }
        self.payload.encode_request(&mut body);
        body.extend_from_slice(&self.extra_token);

        let key = self.request_key()?;
        let body = match key {
            Some(key) if !body.is_empty() => encrypt(&key, &body),
            _ => body,
        };

        debug!("Encoding {} request, {} payload bytes", self.opcode(), body.len());
        encode_frame(&self.shared_key, self.status, self.opcode(), &body)
    }

    /// Encode as a reply frame, the way the server does.
    ///
    /// The payload is encrypted under the hex-decoded shared key field when it
    /// is set, otherwise under `caller_key`.
    pub fn encode_reply(&self, caller_key: Option<&[u8]>) -> Result<Bytes, UotpError> {
        let mut body = Vec::new();
        self.payload.encode_reply(&mut body);

        let embedded = embedded_key(&self.shared_key)?;
        let key = embedded.as_deref().or(caller_key).filter(|k| !k.is_empty());
        let body = match key {
            Some(key) if !body.is_empty() => encrypt(key, &body),
            _ => body,
        };

        encode_frame(&self.shared_key, self.status, self.opcode(), &body)
    }

    /// Decode a reply body (the frame without its 6-byte length header).
    ///
    /// `caller_key` is the key the request was encrypted with. A non-empty
    /// shared key field in the reply takes priority over it.
    pub fn decode(body: &[u8], caller_key: Option<&[u8]>) -> Result<Self, UotpError> {
        ensure_len(body, MIN_BODY_SIZE)?;

        let key_field = ascii_field(body, 0..SHARED_KEY_FIELD_SIZE, "shared key")?.trim();
        let status = Status::from_bytes(body[SHARED_KEY_FIELD_SIZE..SHARED_KEY_FIELD_SIZE + STATUS_SIZE].try_into()?);
        let opcode_raw: u16 = decimal_field(body, SHARED_KEY_FIELD_SIZE + STATUS_SIZE..MIN_BODY_SIZE, "opcode")?;
        let opcode = OpCode::try_from(opcode_raw)
            .map_err(|_| UotpError::InvalidPacket(format!("unknown opcode {opcode_raw:03}")))?;

        let shared_key = Bytes::copy_from_slice(key_field.as_bytes());
        let embedded = embedded_key(&shared_key)?;
        let key = embedded.as_deref().or(caller_key).filter(|k| !k.is_empty());

        let payload = &body[MIN_BODY_SIZE..];
        let payload = match key {
            Some(key) => decrypt(key, payload)?,
            None => payload.to_vec(),
        };

        debug!("Decoded {opcode} reply, status {status}, {} payload bytes", payload.len());

        if !status.is_ok() {
            return Err(UotpError::Server {
                status: status.to_string(),
                message: decode_legacy(&payload).trim().to_string(),
            });
        }

        Ok(Self {
            status,
            payload: Payload::decode(opcode, &payload)?,
            oid: 0,
            shared_key,
            extra_token: Bytes::new(),
        })
    }

    /// Decode a complete frame including its length header.
    pub fn decode_frame(frame: &[u8], caller_key: Option<&[u8]>) -> Result<Self, UotpError> {
        ensure_len(frame, LENGTH_HEADER_SIZE)?;
        let length = parse_length_header(&frame[..LENGTH_HEADER_SIZE])?;
        let body = &frame[LENGTH_HEADER_SIZE..];
        if body.len() != length {
            return Err(UotpError::InvalidPacket(format!(
                "length header says {length} bytes, frame carries {}",
                body.len()
            )));
        }
        Self::decode(body, caller_key)
    }
}

/// Hex-decode the shared key field of a reply. Empty means no key.
fn embedded_key(shared_key: &[u8]) -> Result<Option<Vec<u8>>, UotpError> {
    if shared_key.is_empty() {
        return Ok(None);
    }
    hex::decode(shared_key)
        .map(Some)
        .map_err(|e| UotpError::InvalidPacket(format!("shared key field is not hex: {e}")))
}

/// Assemble a frame from its parts. `body` is the already-encrypted payload.
pub fn encode_frame(shared_key: &[u8], status: Status, opcode: OpCode, body: &[u8]) -> Result<Bytes, UotpError> {
    if shared_key.len() > SHARED_KEY_FIELD_SIZE {
        return Err(UotpError::InvalidArgument(format!(
            "shared key is {} bytes, the field holds {SHARED_KEY_FIELD_SIZE}",
            shared_key.len()
        )));
    }
    let body_len = MIN_BODY_SIZE + body.len();
    if body_len > MAX_BODY_SIZE {
        return Err(UotpError::InvalidArgument(format!("body of {body_len} bytes does not fit the length field")));
    }

    let mut frame = BytesMut::with_capacity(LENGTH_HEADER_SIZE + body_len);
    frame.put_u8(FRAME_MARKER);
    frame.put_slice(format!("{body_len:0width$}", width = BODY_LENGTH_DIGITS).as_bytes());

    let mut key_field = Vec::with_capacity(SHARED_KEY_FIELD_SIZE);
    push_right(&mut key_field, shared_key, SHARED_KEY_FIELD_SIZE);
    frame.put_slice(&key_field);

    frame.put_slice(status.as_bytes());
    frame.put_slice(format!("{:0width$}", u16::from(opcode), width = OPCODE_DIGITS).as_bytes());
    frame.put_slice(body);
    Ok(frame.freeze())
}

/// Body length announced by a 6-byte length header.
///
/// The marker byte is not checked.
pub fn parse_length_header(header: &[u8]) -> Result<usize, UotpError> {
    ensure_len(header, LENGTH_HEADER_SIZE)?;
    decimal_field(header, 1..LENGTH_HEADER_SIZE, "body length")
}

/// 42-byte device header with a randomly picked carrier profile.
fn common_header(oid: u64) -> Vec<u8> {
    let (carrier, model) = DEVICE_PROFILES[rand::random_range(0..DEVICE_PROFILES.len())];

    let mut out = Vec::with_capacity(COMMON_HEADER_SIZE);
    push_left(&mut out, carrier.as_bytes(), CARRIER_TAG_WIDTH);
    if oid != 0 {
        push_left(&mut out, oid.to_string().as_bytes(), OID_DIGITS);
    } else {
        push_left(&mut out, b"", OID_DIGITS);
    }
    push_left(&mut out, model.as_bytes(), DEVICE_MODEL_WIDTH);
    out.extend_from_slice(CLIENT_TAG.as_bytes());
    out.extend_from_slice(format!("{CLIENT_VERSION:04}{CLIENT_FLAGS:04}").as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::TimeSync;

    #[test]
    fn test_time_request_layout() {
        let frame = Packet::new(Payload::request(OpCode::Time)).encode().unwrap();
        let mut expected = b"S00071".to_vec();
        expected.extend_from_slice(&[b' '; 64]);
        expected.extend_from_slice(b"0000407");
        assert_eq!(&frame[..], &expected[..]);
    }

    #[test]
    fn test_common_header_layout() {
        let header = common_header(12345678);
        assert_eq!(header.len(), COMMON_HEADER_SIZE);

        let carrier = std::str::from_utf8(&header[..3]).unwrap();
        let model = std::str::from_utf8(&header[14..30]).unwrap().trim_end();
        assert!(DEVICE_PROFILES.contains(&(carrier, model)), "{carrier} / {model}");
        assert_eq!(&header[3..14], b"12345678   ");
        assert_eq!(&header[30..], b"GA1500020000");

        assert_eq!(&common_header(0)[3..14], &[b' '; 11]);
    }

    #[test]
    fn test_status() {
        assert!(Status::OK.is_ok());
        assert_eq!(Status::from_text("1").unwrap().as_bytes(), b"   1");
        assert!(!Status::from_text("9001").unwrap().is_ok());
        assert!(Status::from_text("12345").is_err());
    }

    #[test]
    fn test_set_encryption_info() {
        let mut packet = Packet::new(Payload::request(OpCode::ResetErrorCount));
        packet.set_encryption_info(Some(b"abcd"), Some("12345"));
        assert_eq!(&packet.extra_token[..], b"  12345 ");
        assert_eq!(packet.extra_token.len(), 8);

        packet.set_encryption_info(None, Some(""));
        assert_eq!(&packet.shared_key[..], b"abcd");
        assert_eq!(&packet.extra_token[..], b"  12345 ");
    }

    #[test]
    fn test_request_key_rules() {
        let mut packet = Packet::new(Payload::request(OpCode::Help));
        assert_eq!(packet.request_key().unwrap(), None);

        packet.set_encryption_info(Some(b"00ff"), None);
        assert_eq!(packet.request_key().unwrap(), Some(b"00ff".to_vec()));

        packet.set_encryption_info(None, Some("1234567"));
        assert_eq!(packet.request_key().unwrap(), Some(combine_key(b"00ff", b"1234567 ").unwrap()));
    }

    #[test]
    fn test_issue_request_key() {
        let packet = Packet::issue_request(1);
        assert_eq!(packet.shared_key.len(), 64);
        assert_eq!(packet.request_key().unwrap().as_deref(), Some(&packet.shared_key[..]));
    }

    #[test]
    fn test_length_header() {
        assert_eq!(parse_length_header(b"S00123").unwrap(), 123);
        assert_eq!(parse_length_header(b"X00071").unwrap(), 71);
        assert!(parse_length_header(b"S0x123").unwrap_err().is_framing());
        assert!(parse_length_header(b"S001").unwrap_err().is_framing());
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let frame = encode_frame(b"", Status::OK, OpCode::Time, &[0, 0, 0, 1]).unwrap();
        let mut body = frame[LENGTH_HEADER_SIZE..].to_vec();
        body[68..71].copy_from_slice(b"999");
        assert!(Packet::decode(&body, None).unwrap_err().is_framing());
    }

    #[test]
    fn test_reply_roundtrip_with_caller_key() {
        let reply = Packet::new(Payload::Time(TimeSync { time: 1_000_000 }));
        let frame = reply.encode_reply(Some(b"caller")).unwrap();
        assert_eq!(parse_length_header(&frame).unwrap(), frame.len() - LENGTH_HEADER_SIZE);

        let decoded = Packet::decode_frame(&frame, Some(b"caller")).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn test_embedded_key_takes_priority() {
        let mut reply = Packet::new(Payload::Time(TimeSync { time: 77 }));
        reply.shared_key = Bytes::from_static(b"0102030405");
        let frame = reply.encode_reply(Some(b"ignored")).unwrap();

        let decoded = Packet::decode_frame(&frame, Some(b"other caller key")).unwrap();
        assert_eq!(decoded.payload, Payload::Time(TimeSync { time: 77 }));
        assert_eq!(&decoded.shared_key[..], b"0102030405");
    }

    #[test]
    fn test_oversized_shared_key() {
        let err = encode_frame(&[b'a'; 65], Status::OK, OpCode::Help, b"").unwrap_err();
        assert!(matches!(err, UotpError::InvalidArgument(_)));
    }
}
