use crate::constants::SEED_SIZE;
use crate::error::UotpError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 20-byte account secret issued by the server.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Seed([u8; SEED_SIZE]);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Seed {
    type Error = UotpError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; SEED_SIZE] = bytes
            .try_into()
            .map_err(|_| UotpError::InvalidAccount(format!("seed must be {SEED_SIZE} bytes, got {}", bytes.len())))?;
        Ok(Self(bytes))
    }
}

// Keep the secret out of logs
impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// In-memory account state. Empty until issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    /// User hash assigned at issuance, used as the persistent shared key
    pub id: String,
    pub oid: u64,
    pub seed: Option<Seed>,
    /// Grouped for display, e.g. `1234-5678-9012-3456`
    pub serial_number: String,
    /// Server time minus local protocol time, in seconds
    pub time_diff: i64,
}

impl Account {
    pub fn is_issued(&self) -> bool {
        self.seed.is_some()
    }

    /// Persistable form of this account.
    pub fn to_record(&self) -> AccountRecord {
        AccountRecord {
            id: self.id.clone(),
            oid: self.oid.to_string(),
            seed: self.seed.map(|s| STANDARD.encode(s.as_bytes())).unwrap_or_default(),
            serial_number: self.serial_number.clone(),
            time_diff: self.time_diff,
        }
    }
}

/// Account as stored by the embedding application.
///
/// ```json
/// { "id": "...", "oid": "12345678", "seed": "<base64>", "serial_number": "1234-...", "time_diff": 0 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub oid: String,
    pub seed: String,
    pub serial_number: String,
    pub time_diff: i64,
}

impl TryFrom<&AccountRecord> for Account {
    type Error = UotpError;

    fn try_from(record: &AccountRecord) -> Result<Self, Self::Error> {
        let oid = record
            .oid
            .parse()
            .map_err(|_| UotpError::InvalidAccount(format!("oid is not a decimal number: {:?}", record.oid)))?;

        let seed = if record.seed.is_empty() {
            None
        } else {
            let raw = STANDARD
                .decode(&record.seed)
                .map_err(|e| UotpError::InvalidAccount(format!("seed is not base64: {e}")))?;
            Some(Seed::try_from(raw.as_slice())?)
        };

        Ok(Account {
            id: record.id.clone(),
            oid,
            seed,
            serial_number: record.serial_number.clone(),
            time_diff: record.time_diff,
        })
    }
}
