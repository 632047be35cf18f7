// Protocol constants for the U-OTP wire format

/// Default server endpoint
pub const DEFAULT_ENDPOINT: &str = "211.49.97.230:20004";

/// Literal first byte of every frame
pub const FRAME_MARKER: u8 = b'S';

/// Size of the length prefix: marker (1) + decimal body length (5)
pub const LENGTH_HEADER_SIZE: usize = 6;

/// Width of the decimal body length field
pub const BODY_LENGTH_DIGITS: usize = 5;

/// Width of the right-justified shared key field
pub const SHARED_KEY_FIELD_SIZE: usize = 64;

/// Width of the status field
pub const STATUS_SIZE: usize = 4;

/// Width of the decimal opcode field
pub const OPCODE_DIGITS: usize = 3;

/// Minimum body size: shared key + status + opcode
pub const MIN_BODY_SIZE: usize = SHARED_KEY_FIELD_SIZE + STATUS_SIZE + OPCODE_DIGITS;

/// Largest body the 5-digit length field can describe
pub const MAX_BODY_SIZE: usize = 99_999;

/// The only status code meaning success
pub const STATUS_OK: &[u8; STATUS_SIZE] = b"0000";

/// Size of the proof-of-possession field: 7-char token + 1 space
pub const EXTRA_TOKEN_SIZE: usize = 8;

/// Number of digits in a token
pub const TOKEN_DIGITS: usize = 7;

/// Width of a decimal OID field
pub const OID_DIGITS: usize = 11;

/// Size of the account seed in bytes
pub const SEED_SIZE: usize = 20;

/// Block size of the packet cipher
pub const BLOCK_SIZE: usize = 16;

/// Common header field widths
pub const CARRIER_TAG_WIDTH: usize = 3;
pub const DEVICE_MODEL_WIDTH: usize = 16;
pub const CLIENT_TAG: &str = "GA15";

/// Two trailing 4-digit fields of the common header
pub const CLIENT_VERSION: u16 = 2;
pub const CLIENT_FLAGS: u16 = 0;

/// Total size of the common device header
pub const COMMON_HEADER_SIZE: usize = CARRIER_TAG_WIDTH + OID_DIGITS + DEVICE_MODEL_WIDTH + 4 + 4 + 4;

/// (carrier tag, device model) pairs the common header picks from
pub const DEVICE_PROFILES: [(&str, &str); 3] = [("KTF", "SM-G920K"), ("SKT", "SM-G950S"), ("LGT", "SM-G955L")];

/// Period code sent with every history request
pub const HISTORY_PERIOD: u8 = 3;
