use bytes::BytesMut;

use crate::proto::ClientOp;

use super::FrameEncoder;

#[derive(Debug)]
pub struct FramedEncoder {
    buf: BytesMut,
}

impl FramedEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn encode(&mut self, item: &ClientOp) -> BytesMut {
        struct Encoder<'a>(&'a mut FramedEncoder);

        impl FrameEncoder for Encoder<'_> {
            fn small_write(&mut self, buf: &[u8]) {
                self.0.buf.extend_from_slice(buf);
            }
        }

        super::encode(&mut Encoder(self), item);
        self.buf.split()
    }
}

impl Default for FramedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use core::num::NonZeroU64;

    use bytes::Bytes;

    use super::FramedEncoder;
    use crate::{proto::ClientOp, MessageBase, QueueGroup, Subject};

    #[test]
    fn encode_ping() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(&encoder.encode(&ClientOp::Ping)[..], b"PING\r\n");
    }

    #[test]
    fn encode_pong() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(&encoder.encode(&ClientOp::Pong)[..], b"PONG\r\n");
    }

    #[test]
    fn encode_subscribe() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(
            &encoder.encode(&ClientOp::Subscribe {
                id: 1.into(),
                subject: Subject::from_static("hello.world"),
                queue_group: None,
            })[..],
            b"SUB hello.world 1\r\n"
        );
    }

    #[test]
    fn encode_subscribe_with_queue_group() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(
            &encoder.encode(&ClientOp::Subscribe {
                id: 1.into(),
                subject: Subject::from_static("hello.world"),
                queue_group: Some(QueueGroup::from_static("stuff")),
            })[..],
            b"SUB hello.world stuff 1\r\n"
        );
    }

    #[test]
    fn encode_unsubscribe() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(
            &encoder.encode(&ClientOp::Unsubscribe {
                id: 1.into(),
                max_messages: None,
            })[..],
            b"UNSUB 1\r\n"
        );
    }

    #[test]
    fn encode_unsubscribe_with_max_messages() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(
            &encoder.encode(&ClientOp::Unsubscribe {
                id: 1.into(),
                max_messages: Some(NonZeroU64::new(5).unwrap()),
            })[..],
            b"UNSUB 1 5\r\n"
        );
    }

    #[test]
    fn encode_publish() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(
            &encoder.encode(&ClientOp::Publish {
                message: MessageBase {
                    subject: Subject::from_static("hello.world"),
                    reply_subject: None,
                    payload: Bytes::from_static(b"Hello World!"),
                },
            })[..],
            b"PUB hello.world 12\r\nHello World!\r\n"
        );
    }

    #[test]
    fn encode_publish_with_reply_subject() {
        let mut encoder = FramedEncoder::new();
        assert_eq!(
            &encoder.encode(&ClientOp::Publish {
                message: MessageBase {
                    subject: Subject::from_static("hello.world"),
                    reply_subject: Some(Subject::from_static("_INBOX.1234")),
                    payload: Bytes::from_static(b"Hello World!"),
                },
            })[..],
            b"PUB hello.world _INBOX.1234 12\r\nHello World!\r\n"
        );
    }
}
