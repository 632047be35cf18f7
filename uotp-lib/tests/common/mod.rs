//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use uotp_lib::clock::Clock;
#[allow(unused_imports)]
pub use uotp_lib::error::UotpError;
#[allow(unused_imports)]
pub use uotp_lib::packet::{OpCode, Packet, Status};
#[allow(unused_imports)]
pub use uotp_lib::payload::Payload;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use uotp_lib::constants::{LENGTH_HEADER_SIZE, SHARED_KEY_FIELD_SIZE};
use uotp_lib::packet::parse_length_header;
use uotp_lib::transport::TransportConfig;

/// Clock pinned to one protocol epoch
#[allow(dead_code)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
    fn now(&self) -> u32 {
        self.0
    }
}

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Trimmed content of a request's shared key field
#[allow(dead_code)]
pub fn shared_key_field(frame: &[u8]) -> Vec<u8> {
    let field = &frame[LENGTH_HEADER_SIZE..LENGTH_HEADER_SIZE + SHARED_KEY_FIELD_SIZE];
    std::str::from_utf8(field).unwrap().trim().as_bytes().to_vec()
}

/// Transport config pointing at a fixture server with short timeouts
#[allow(dead_code)]
pub fn local_config(addr: SocketAddr) -> TransportConfig {
    TransportConfig {
        endpoint: addr.to_string(),
        connect_timeout: Duration::from_secs(2),
        io_timeout: Duration::from_secs(2),
    }
}

/// Local server answering one request per connection.
///
/// `handler` maps each complete request frame to a complete reply frame. The
/// returned task yields every request frame received.
#[allow(dead_code)]
pub async fn fixture_server<F>(connections: usize, handler: F) -> (SocketAddr, JoinHandle<Vec<Bytes>>)
where
    F: Fn(&[u8]) -> Bytes + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let mut requests = Vec::new();
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().await.unwrap();
            requests.push(answer(&mut stream, &handler).await);
        }
        requests
    });

    (addr, task)
}

/// Local server that leaves its first connection hanging and answers the
/// second one with `handler`.
#[allow(dead_code)]
pub async fn stalling_server<F>(handler: F) -> (SocketAddr, JoinHandle<Bytes>)
where
    F: Fn(&[u8]) -> Bytes + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (_stalled, _) = listener.accept().await.unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();
        answer(&mut stream, &handler).await
    });

    (addr, task)
}

/// Read one request frame, write the handler's reply and return the request.
async fn answer<F>(stream: &mut TcpStream, handler: &F) -> Bytes
where
    F: Fn(&[u8]) -> Bytes,
{
    let mut frame = vec![0u8; LENGTH_HEADER_SIZE];
    stream.read_exact(&mut frame).await.unwrap();
    let length = parse_length_header(&frame).unwrap();
    frame.resize(LENGTH_HEADER_SIZE + length, 0);
    stream.read_exact(&mut frame[LENGTH_HEADER_SIZE..]).await.unwrap();

    let reply = handler(&frame);
    stream.write_all(&reply).await.unwrap();
    Bytes::from(frame)
}

/// Local server that accepts connections and never answers.
#[allow(dead_code)]
pub async fn silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });

    (addr, task)
}
