use core::{mem, ops::Deref};

use bytes::{Buf, Bytes, BytesMut};
use bytestring::ByteString;

use crate::{
    error::ServerError,
    util::{self, ParseUintError},
    MessageBase, ServerMessage, Subject, SubscriptionId,
};

pub use self::framed::{decode_frame, FrameDecoderError};
pub use self::stream::StreamDecoder;

use super::ServerOp;

mod framed;
mod stream;

const MAX_HEAD_LEN: usize = 16 * 1024;

#[derive(Debug)]
pub(super) enum DecoderStatus {
    ControlLine {
        last_bytes_read: usize,
    },
    Payload {
        subscription_id: SubscriptionId,
        subject: Subject,
        reply_subject: Option<Subject>,
        payload_len: usize,
    },
}

pub(super) trait BytesLike: Buf + Deref<Target = [u8]> {
    fn len(&self) -> usize {
        Buf::remaining(self)
    }

    fn split_to(&mut self, at: usize) -> Bytes {
        self.copy_to_bytes(at)
    }
}

impl BytesLike for Bytes {}
impl BytesLike for BytesMut {}

pub(super) fn decode(
    status: &mut DecoderStatus,
    read_buf: &mut impl BytesLike,
) -> Result<Option<ServerOp>, DecoderError> {
    match status {
        DecoderStatus::ControlLine { last_bytes_read } => {
            if *last_bytes_read == read_buf.len() {
                // No progress has been made
                return Ok(None);
            }

            let Some(control_line_len) = memchr::memmem::find(read_buf, b"\r\n") else {
                *last_bytes_read = read_buf.len();
                return Ok(None);
            };

            let mut control_line = read_buf.split_to(control_line_len + "\r\n".len());
            control_line.truncate(control_line.len() - 2);

            if control_line.starts_with(b"+OK") {
                Ok(Some(ServerOp::Success))
            } else if control_line.starts_with(b"MSG ") {
                *status = decode_msg(control_line)?;
                decode(status, read_buf)
            } else if control_line.starts_with(b"PING") {
                Ok(Some(ServerOp::Ping))
            } else if control_line.starts_with(b"PONG") {
                Ok(Some(ServerOp::Pong))
            } else if control_line.starts_with(b"-ERR ") {
                control_line.advance("-ERR ".len());
                if !control_line.starts_with(b"'") || !control_line.ends_with(b"'") {
                    return Err(DecoderError::InvalidErrorMessage);
                }

                control_line.advance(1);
                control_line.truncate(control_line.len() - 1);
                let raw_message = ByteString::try_from(control_line)
                    .map_err(|_| DecoderError::InvalidErrorMessage)?;
                let error = ServerError::parse(raw_message);
                Ok(Some(ServerOp::Error { error }))
            } else if let Some(info) = control_line.strip_prefix(b"INFO ") {
                let info = serde_json::from_slice(info).map_err(DecoderError::InvalidInfo)?;
                Ok(Some(ServerOp::Info { info }))
            } else if read_buf.len() > MAX_HEAD_LEN {
                Err(DecoderError::HeadTooLong {
                    len: read_buf.len(),
                })
            } else {
                Err(DecoderError::InvalidCommand)
            }
        }
        DecoderStatus::Payload { payload_len, .. } => {
            if read_buf.len() < *payload_len + "\r\n".len() {
                return Ok(None);
            }

            let DecoderStatus::Payload {
                subscription_id,
                subject,
                reply_subject,
                payload_len,
            } = mem::replace(status, DecoderStatus::ControlLine { last_bytes_read: 0 })
            else {
                unreachable!()
            };

            let payload = read_buf.split_to(payload_len);
            read_buf.advance("\r\n".len());
            let message = ServerMessage {
                subscription_id,
                base: MessageBase {
                    subject,
                    reply_subject,
                    payload,
                },
            };
            Ok(Some(ServerOp::Message { message }))
        }
    }
}

fn decode_msg(mut control_line: Bytes) -> Result<DecoderStatus, DecoderError> {
    control_line.advance("MSG ".len());

    let mut chunks = util::split_spaces(control_line);
    let (subject, subscription_id, reply_subject, payload_len) = match (
        chunks.next(),
        chunks.next(),
        chunks.next(),
        chunks.next(),
        chunks.next(),
    ) {
        (Some(subject), Some(subscription_id), Some(reply_subject), Some(payload_len), None) => {
            (subject, subscription_id, Some(reply_subject), payload_len)
        }
        (Some(subject), Some(subscription_id), Some(payload_len), None, None) => {
            (subject, subscription_id, None, payload_len)
        }
        _ => return Err(DecoderError::InvalidMsgArgsCount),
    };
    let subject = Subject::from_dangerous_value(
        subject
            .try_into()
            .map_err(|_| DecoderError::SubjectInvalidUtf8)?,
    );
    let subscription_id =
        SubscriptionId::from_ascii_bytes(&subscription_id).map_err(DecoderError::SubscriptionId)?;
    let reply_subject = reply_subject
        .map(|reply_subject| {
            ByteString::try_from(reply_subject).map_err(|_| DecoderError::SubjectInvalidUtf8)
        })
        .transpose()?
        .map(Subject::from_dangerous_value);
    let payload_len =
        util::parse_usize(&payload_len).map_err(DecoderError::InvalidPayloadLength)?;
    Ok(DecoderStatus::Payload {
        subscription_id,
        subject,
        reply_subject,
        payload_len,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("The head exceeded the maximum head length (len {len} maximum {MAX_HEAD_LEN}")]
    HeadTooLong { len: usize },
    #[error("Invalid command")]
    InvalidCommand,
    #[error("MSG command has an unexpected number of arguments")]
    InvalidMsgArgsCount,
    #[error("The subject isn't valid utf-8")]
    SubjectInvalidUtf8,
    #[error("Couldn't parse the Subscription ID")]
    SubscriptionId(#[source] ParseUintError),
    #[error("Couldn't parse the length of the payload")]
    InvalidPayloadLength(#[source] ParseUintError),
    #[error("INFO command JSON payload couldn't be deserialized")]
    InvalidInfo(#[source] serde_json::Error),
    #[error("-ERR command message couldn't be deserialized")]
    InvalidErrorMessage,
}
