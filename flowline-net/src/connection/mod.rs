use std::io;

use flowline_proto::{
    error::ServerError,
    proto::{error::DecoderError, ClientOp, ServerOp},
    Connect, ServerInfo,
};
use tokio::io::{AsyncRead, AsyncWrite};

pub use self::streaming::{StreamingConnection, StreamingReadError};

mod streaming;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("proto")]
    Proto(#[source] DecoderError),
    #[error("server")]
    ServerError(#[source] ServerError),
    #[error("io")]
    Io(#[source] io::Error),
    #[error("unexpected ServerOp")]
    UnexpectedOp,
}

/// Wait for the broker's `INFO` frame, then send `CONNECT` on
/// a pre-established connection `conn`.
///
/// Per the wire protocol, the broker sends `INFO` immediately once the
/// transport is up; that arrival is what triggers the handshake, so it
/// must be read and consumed before `CONNECT` is written.
///
/// # Errors
///
/// Returns an error if connecting fails
pub async fn connect<S>(
    conn: &mut StreamingConnection<S>,
    connect: Connect,
) -> Result<Box<ServerInfo>, ConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let info = match conn.read_next().await {
        Ok(ServerOp::Info { info }) => info,
        Ok(ServerOp::Success | ServerOp::Message { .. } | ServerOp::Ping | ServerOp::Pong) => {
            return Err(ConnectError::UnexpectedOp);
        }
        Ok(ServerOp::Error { error }) => return Err(ConnectError::ServerError(error)),
        Err(StreamingReadError::Decoder(err)) => return Err(ConnectError::Proto(err)),
        Err(StreamingReadError::Io(err)) => return Err(ConnectError::Io(err)),
    };

    conn.enqueue_write_op(&ClientOp::Connect {
        connect: Box::new(connect),
    });
    conn.write_and_flush().await.map_err(ConnectError::Io)?;

    conn.enqueue_write_op(&ClientOp::Ping);
    conn.write_and_flush().await.map_err(ConnectError::Io)?;

    loop {
        match conn.read_next().await {
            Ok(ServerOp::Success) => {
                // Success. Repeat to receive the PONG
            }
            Ok(ServerOp::Pong) => {
                // Success. We've received the PONG,
                // possibly after having received OK.
                return Ok(info);
            }
            Ok(ServerOp::Ping) => {
                // I guess this could somehow happen. Handle it and repeat
                conn.enqueue_write_op(&ClientOp::Pong);
            }
            Ok(ServerOp::Error { error }) => return Err(ConnectError::ServerError(error)),
            Ok(ServerOp::Info { .. } | ServerOp::Message { .. }) => {
                return Err(ConnectError::UnexpectedOp);
            }
            Err(StreamingReadError::Decoder(err)) => return Err(ConnectError::Proto(err)),
            Err(StreamingReadError::Io(err)) => return Err(ConnectError::Io(err)),
        }
    }
}
