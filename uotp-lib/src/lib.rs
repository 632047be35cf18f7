pub mod account;
pub mod cipher;
pub mod clock;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod history;
pub mod packet;
pub mod payload;
pub mod session;
pub mod text;
pub mod token;
pub mod transport;


// Re-export the session types for easy access
pub use account::{Account, AccountRecord, Seed};
pub use error::UotpError;
pub use session::Session;
pub use transport::{TcpTransport, Transport, TransportConfig};
pub use tokio_util::sync::CancellationToken;
