pub use self::connection::{connect as proto_connect, StreamingConnection};

mod connection;

pub mod error {
    pub use super::connection::{ConnectError, StreamingReadError};
}
