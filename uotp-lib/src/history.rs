//! Usage history (opcode 453).
//!
//! Reply layout:
//!
//! | Offset | Size | Field                               |
//! |--------|------|-------------------------------------|
//! | 0      | 10   | period start, `YYYY-MM-DD`          |
//! | 10     | 10   | period end, `YYYY-MM-DD`            |
//! | 20     | 4    | total pages                         |
//! | 24     | 4    | current page                        |
//! | 28     | 2    | entry count                         |
//! | 30     | 98×n | entries                             |
//!
//! Each entry is an 18-byte timestamp (`YYYY-MM-DDhh:mm:ss`) followed by a
//! 40-byte usage type and a 40-byte service name, both legacy-encoded.

use crate::constants::HISTORY_PERIOD;
use crate::error::{UotpError, ensure_len};
use crate::packet::OpCode;
use crate::payload::Body;
use crate::text::{ascii_field, decimal_field, decode_legacy, encode_legacy, push_left};
use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d%H:%M:%S";

const HEADER_SIZE: usize = 30;
const TIMESTAMP_SIZE: usize = 18;
const TEXT_SIZE: usize = 40;

/// Size of one history entry on the wire
pub const ENTRY_SIZE: usize = TIMESTAMP_SIZE + 2 * TEXT_SIZE;

/// One recorded use of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub at: NaiveDateTime,
    pub kind: String,
    pub name: String,
}

/// A page of usage history.
///
/// `request_page` and `request_period` are only sent; the rest is only received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    pub request_page: u16,
    pub request_period: u8,

    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub page_total: u16,
    pub page_current: u16,
    pub entries: Vec<HistoryEntry>,
}

impl History {
    /// Request for a 1-based page over the default period.
    pub fn request(page: u16) -> Self {
        Self {
            request_page: page,
            request_period: HISTORY_PERIOD,
            ..Default::default()
        }
    }
}

fn parse_date(data: &[u8], offset: usize, name: &str) -> Result<NaiveDate, UotpError> {
    let text = ascii_field(data, offset..offset + 10, name)?;
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| UotpError::InvalidPacket(format!("{name} {text:?}: {e}")))
}

fn parse_entry(data: &[u8]) -> Result<HistoryEntry, UotpError> {
    let stamp = ascii_field(data, 0..TIMESTAMP_SIZE, "entry timestamp")?;
    let at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .map_err(|e| UotpError::InvalidPacket(format!("entry timestamp {stamp:?}: {e}")))?;

    let kind_end = TIMESTAMP_SIZE + TEXT_SIZE;
    Ok(HistoryEntry {
        at,
        kind: decode_legacy(&data[TIMESTAMP_SIZE..kind_end]).trim().to_string(),
        name: decode_legacy(&data[kind_end..ENTRY_SIZE]).trim().to_string(),
    })
}

/// Legacy-encode `text` into exactly `width` bytes.
fn push_legacy(out: &mut Vec<u8>, text: &str, width: usize) {
    let encoded = encode_legacy(text);
    push_left(out, &encoded[..encoded.len().min(width)], width);
}

impl Body for History {
    const OPCODE: OpCode = OpCode::UseHistory;

    fn encode_request(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(format!("{:04}{:1}", self.request_page, self.request_period).as_bytes());
    }

    fn decode(data: &[u8]) -> Result<Self, UotpError> {
        ensure_len(data, HEADER_SIZE)?;

        let period_start = parse_date(data, 0, "period start")?;
        let period_end = parse_date(data, 10, "period end")?;
        let page_total = decimal_field(data, 20..24, "total pages")?;
        let page_current = decimal_field(data, 24..28, "current page")?;
        let count: usize = decimal_field(data, 28..30, "entry count")?;

        ensure_len(data, HEADER_SIZE + ENTRY_SIZE * count)?;

        let entries = data[HEADER_SIZE..]
            .chunks_exact(ENTRY_SIZE)
            .take(count)
            .map(parse_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            request_page: 0,
            request_period: 0,
            period_start,
            period_end,
            page_total,
            page_current,
            entries,
        })
    }

    fn encode_reply(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.period_start.format(DATE_FORMAT).to_string().as_bytes());
        out.extend_from_slice(self.period_end.format(DATE_FORMAT).to_string().as_bytes());
        out.extend_from_slice(
            format!("{:04}{:04}{:02}", self.page_total, self.page_current, self.entries.len()).as_bytes(),
        );
        for entry in &self.entries {
            out.extend_from_slice(entry.at.format(TIMESTAMP_FORMAT).to_string().as_bytes());
            push_legacy(out, &entry.kind, TEXT_SIZE);
            push_legacy(out, &entry.name, TEXT_SIZE);
        }
    }
}
