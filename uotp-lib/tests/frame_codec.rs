mod common;

use chrono::NaiveDate;
use common::*;
use uotp_lib::constants::{COMMON_HEADER_SIZE, LENGTH_HEADER_SIZE, MIN_BODY_SIZE};
use uotp_lib::envelope::{decrypt, encrypt};
use uotp_lib::history::{History, HistoryEntry};
use uotp_lib::packet::encode_frame;
use uotp_lib::payload::{Information, Issue, TimeSync};
use uotp_lib::text::encode_legacy;

#[test]
fn test_reply_roundtrip_all_payloads() {
    let payloads = vec![
        Payload::Time(TimeSync { time: 1_000_000 }),
        Payload::Issue(Issue {
            serial_number: "1234567890123456".to_string(),
            oid: 12345678,
            seed: [0x5a; 20],
            user_hash: "cd".repeat(32),
            issue_info: "발급 완료".to_string(),
        }),
        Payload::Information(Information {
            oid: 12345678,
            seed_label: "label".to_string(),
            partner: "partner".to_string(),
        }),
        Payload::request(OpCode::ResetErrorCount),
        Payload::History(History {
            period_start: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            page_total: 3,
            page_current: 2,
            entries: vec![HistoryEntry {
                at: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(0, 0, 1).unwrap(),
                kind: "OTP 인증".to_string(),
                name: "은행".to_string(),
            }],
            ..Default::default()
        }),
    ];

    for payload in payloads {
        for key in [None, Some(&b"caller key"[..])] {
            let packet = Packet::new(payload.clone());
            let frame = packet.encode_reply(key).unwrap();
            let decoded = Packet::decode_frame(&frame, key).unwrap();
            assert_eq!(decoded, packet, "{:?} with key {key:?}", payload.opcode());
        }
    }
}

#[test]
fn test_short_frame_is_framing_error() {
    for len in [0, 1, 70] {
        let body = vec![b' '; len];
        let err = Packet::decode(&body, None).unwrap_err();
        assert!(err.is_framing(), "{len} bytes: {err}");
    }
}

#[test]
fn test_length_header_mismatch() {
    let frame = Packet::new(Payload::Time(TimeSync { time: 5 })).encode_reply(None).unwrap();
    let err = Packet::decode_frame(&frame[..frame.len() - 1], None).unwrap_err();
    assert!(err.is_framing());
}

#[test]
fn test_history_count_beyond_buffer() {
    // 30-byte header claiming five entries, followed by only one
    let mut payload = b"2024-01-012024-03-310001000105".to_vec();
    payload.extend_from_slice(&[b' '; 98]);
    let frame = encode_frame(b"", Status::OK, OpCode::UseHistory, &payload).unwrap();

    let err = Packet::decode_frame(&frame, None).unwrap_err();
    assert!(
        matches!(err, UotpError::InsufficientData { expected: 520, actual: 128 }),
        "{err}"
    );
}

#[test]
fn test_server_error_with_legacy_message() {
    let message = encode_legacy("인증에 실패했습니다");
    let frame = encode_frame(b"", Status::from_text("9001").unwrap(), OpCode::ResetErrorCount, &message).unwrap();

    match Packet::decode_frame(&frame, None) {
        Err(UotpError::Server { status, message }) => {
            assert_eq!(status, "9001");
            assert_eq!(message, "인증에 실패했습니다");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn test_encrypted_server_error() {
    let message = encrypt(b"caller", &encode_legacy("잠김"));
    let frame = encode_frame(b"", Status::from_text("12").unwrap(), OpCode::Help, &message).unwrap();

    let err = Packet::decode_frame(&frame, Some(b"caller")).unwrap_err();
    assert!(matches!(err, UotpError::Server { ref status, ref message } if status == "  12" && message == "잠김"));
}

#[test]
fn test_request_body_is_encrypted_under_request_key() {
    let packet = Packet::issue_request(123_456);
    let frame = packet.encode().unwrap();
    assert_eq!(parse(&frame[..LENGTH_HEADER_SIZE]), frame.len() - LENGTH_HEADER_SIZE);

    let key = shared_key_field(&frame);
    assert_eq!(key, packet.shared_key.to_vec());

    let body = decrypt(&key, &frame[LENGTH_HEADER_SIZE + MIN_BODY_SIZE..]).unwrap();
    assert_eq!(body.len(), COMMON_HEADER_SIZE);
    assert_eq!(&body[3..14], &[b' '; 11]);
    assert_eq!(&body[30..], b"GA1500020000");
}

#[test]
fn test_authenticated_request_layout() {
    let mut packet = Packet::new(Payload::History(History::request(2)));
    packet.oid = 987;
    packet.set_encryption_info(Some("ab".repeat(32).as_bytes()), Some("0012345"));

    let frame = packet.encode().unwrap();
    let key = packet.request_key().unwrap().unwrap();
    let body = decrypt(&key, &frame[LENGTH_HEADER_SIZE + MIN_BODY_SIZE..]).unwrap();

    // header, then page and period, then the extra token
    assert_eq!(body.len(), COMMON_HEADER_SIZE + 5 + 8);
    assert_eq!(&body[3..14], b"987        ");
    assert_eq!(&body[COMMON_HEADER_SIZE..], b"000230012345 ");
}

fn parse(header: &[u8]) -> usize {
    uotp_lib::packet::parse_length_header(header).unwrap()
}
