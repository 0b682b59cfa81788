//! End-to-end scenarios from spec.md §8, driven against a minimal broker
//! stub speaking the wire protocol directly over a loopback TCP socket.

use std::{str::FromStr, time::Duration};

use flowline::{Client, ServerAddr, Subject};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

async fn accept_and_handshake(listener: &TcpListener) -> BufReader<TcpStream> {
    let (socket, _) = listener.accept().await.expect("accept");
    let mut stream = BufReader::new(socket);

    // The broker sends INFO unprompted the moment the transport is up;
    // receiving it is what triggers the client's CONNECT.
    stream
        .write_all(b"INFO {\"server_id\":\"test\",\"version\":\"0.0.0\",\"max_payload\":1048576,\"proto\":1}\r\n")
        .await
        .expect("write info");
    stream.flush().await.expect("flush info");

    let _connect = read_line(&mut stream).await;
    let _ping = read_line(&mut stream).await;

    stream.write_all(b"+OK\r\n").await.expect("write ok");
    stream.write_all(b"PONG\r\n").await.expect("write pong");
    stream.flush().await.expect("flush handshake");

    stream
}

async fn read_line(stream: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    stream.read_line(&mut line).await.expect("read line");
    assert!(line.ends_with("\r\n"), "unterminated line: {line:?}");
    line.truncate(line.len() - 2);
    line
}

async fn read_payload(stream: &mut BufReader<TcpStream>, len: usize) -> Vec<u8> {
    let mut buf = vec![0_u8; len + 2];
    stream.read_exact(&mut buf).await.expect("read payload");
    buf.truncate(len);
    buf
}

fn server_addr(addr: std::net::SocketAddr) -> ServerAddr {
    ServerAddr::from_str(&addr.to_string()).expect("valid server address")
}

#[tokio::test]
async fn happy_path_publish_delivers_to_handler() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let broker = tokio::spawn(async move {
        let mut stream = accept_and_handshake(&listener).await;

        let sub_line = read_line(&mut stream).await;
        assert!(sub_line.starts_with("SUB foo "), "unexpected: {sub_line}");
        let sid = sub_line.rsplit(' ').next().unwrap().to_owned();

        let pub_line = read_line(&mut stream).await;
        let mut parts = pub_line.split(' ');
        assert_eq!(parts.next(), Some("PUB"));
        assert_eq!(parts.next(), Some("foo"));
        let len: usize = parts.next().unwrap().parse().unwrap();
        assert!(parts.next().is_none());
        let body = read_payload(&mut stream, len).await;
        assert_eq!(body.as_slice(), b"hello");

        let frame = format!("MSG foo {sid} {len}\r\n");
        stream.write_all(frame.as_bytes()).await.unwrap();
        stream.write_all(&body).await.unwrap();
        stream.write_all(b"\r\n").await.unwrap();
        stream.flush().await.unwrap();
    });

    let client = Client::builder()
        .hosts([server_addr(addr)])
        .connect()
        .expect("non-empty hosts");

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe(Subject::from_static("foo"), None, None, move |msg| {
            let _ = tx.send(msg);
        })
        .await
        .expect("client not closed");

    client
        .publish(Subject::from_static("foo"), "hello")
        .expect("client not closed");

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("handler invoked before timeout")
        .expect("channel not closed");

    assert_eq!(received.subject(), &Subject::from_static("foo"));
    assert_eq!(received.body().as_ref(), b"hello");
    assert!(received.reply_to().is_none());
    assert!(!received.is_request());

    tokio::time::timeout(Duration::from_secs(2), broker)
        .await
        .expect("broker finished")
        .unwrap();
    client.close().await;
}

#[tokio::test]
async fn request_reply_delivers_response_and_counts_it() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let broker = tokio::spawn(async move {
        let mut stream = accept_and_handshake(&listener).await;

        let sub_line = read_line(&mut stream).await;
        assert!(sub_line.starts_with("SUB _INBOX."), "unexpected: {sub_line}");
        let sid = sub_line.rsplit(' ').next().unwrap().to_owned();

        let pub_line = read_line(&mut stream).await;
        let mut parts = pub_line.split(' ');
        assert_eq!(parts.next(), Some("PUB"));
        assert_eq!(parts.next(), Some("rpc"));
        let reply_to = parts.next().unwrap().to_owned();
        let len: usize = parts.next().unwrap().parse().unwrap();
        assert!(parts.next().is_none());
        let body = read_payload(&mut stream, len).await;
        assert_eq!(body.as_slice(), b"ping");

        let reply_body = b"PING";
        let frame = format!("MSG {reply_to} {sid} {}\r\n", reply_body.len());
        stream.write_all(frame.as_bytes()).await.unwrap();
        stream.write_all(reply_body).await.unwrap();
        stream.write_all(b"\r\n").await.unwrap();
        stream.flush().await.unwrap();
    });

    let client = Client::builder()
        .hosts([server_addr(addr)])
        .connect()
        .expect("non-empty hosts");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let request = client
        .request(
            Subject::from_static("rpc"),
            "ping",
            Duration::from_secs(2),
            Some(1),
            move |msg| {
                let _ = tx.send(msg);
            },
        )
        .await
        .expect("request accepted");

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("reply received before timeout")
        .expect("channel not closed");

    assert_eq!(received.body().as_ref(), b"PING");
    assert_eq!(request.received_replies(), 1);
    assert_eq!(request.max_replies(), Some(1));

    tokio::time::timeout(Duration::from_secs(2), broker)
        .await
        .expect("broker finished")
        .unwrap();
    client.close().await;
}

#[tokio::test]
async fn request_times_out_without_a_reply() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let broker = tokio::spawn(async move {
        let mut stream = accept_and_handshake(&listener).await;

        let sub_line = read_line(&mut stream).await;
        assert!(sub_line.starts_with("SUB _INBOX."), "unexpected: {sub_line}");

        let pub_line = read_line(&mut stream).await;
        assert!(pub_line.starts_with("PUB rpc "), "unexpected: {pub_line}");
        let len: usize = pub_line.rsplit(' ').next().unwrap().parse().unwrap();
        let _ = read_payload(&mut stream, len).await;
        // Deliberately never reply: the request must time out on its own.
    });

    let client = Client::builder()
        .hosts([server_addr(addr)])
        .connect()
        .expect("non-empty hosts");

    let (tx, mut rx) = mpsc::unbounded_channel::<flowline::Message>();
    let request = client
        .request(
            Subject::from_static("rpc"),
            "ping",
            Duration::from_millis(100),
            None,
            move |msg| {
                let _ = tx.send(msg);
            },
        )
        .await
        .expect("request accepted");

    tokio::time::timeout(Duration::from_secs(2), broker)
        .await
        .expect("broker finished")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(rx.try_recv().is_err(), "handler must not fire after timeout");
    assert_eq!(request.received_replies(), 0);

    client.close().await;
}

#[tokio::test]
async fn max_messages_caps_delivery_and_autocloses() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let broker = tokio::spawn(async move {
        let mut stream = accept_and_handshake(&listener).await;

        let sub_line = read_line(&mut stream).await;
        assert!(sub_line.starts_with("SUB x "), "unexpected: {sub_line}");
        let sid = sub_line.rsplit(' ').next().unwrap().to_owned();

        for _ in 0..3 {
            let frame = format!("MSG x {sid} 5\r\nhello\r\n");
            stream.write_all(frame.as_bytes()).await.unwrap();
        }
        stream.flush().await.unwrap();
    });

    let client = Client::builder()
        .hosts([server_addr(addr)])
        .connect()
        .expect("non-empty hosts");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = client
        .subscribe(Subject::from_static("x"), None, Some(2), move |msg| {
            let _ = tx.send(msg);
        })
        .await
        .expect("client not closed");

    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("message delivered before timeout")
            .expect("channel not closed");
    }

    tokio::time::timeout(Duration::from_secs(2), broker)
        .await
        .expect("broker finished")
        .unwrap();

    // Give the third (over-cap) MSG time to reach, and be rejected by, the engine.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(rx.try_recv().is_err(), "a third message must not be delivered");
    assert_eq!(subscription.received_count(), 2);
    assert!(subscription.is_closed());

    client.close().await;
}

#[tokio::test]
async fn close_is_idempotent_and_fails_fast_afterward() {
    // Bind then immediately drop: the port is free but nothing accepts on
    // it, so the very first dial attempt fails fast with connection refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = Client::builder()
        .hosts([server_addr(addr)])
        .automatic_reconnect(true)
        .connect()
        .expect("non-empty hosts");

    assert!(!client.is_closed());

    tokio::time::timeout(Duration::from_secs(2), client.close())
        .await
        .expect("close completes");
    tokio::time::timeout(Duration::from_secs(2), client.close())
        .await
        .expect("second close is a no-op");

    assert!(client.is_closed());
    assert!(client.publish(Subject::from_static("foo"), "bar").is_err());
}

#[tokio::test]
async fn endpoints_tracks_success_and_failure_counts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let broker = tokio::spawn(async move {
        let _stream = accept_and_handshake(&listener).await;
    });

    let client = Client::builder()
        .hosts([server_addr(addr)])
        .connect()
        .expect("non-empty hosts");

    tokio::time::timeout(Duration::from_secs(2), async {
        while !client.is_connected().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connects before timeout");

    tokio::time::timeout(Duration::from_secs(2), broker)
        .await
        .expect("broker finished")
        .unwrap();

    let endpoints = client.endpoints().await;
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].address(), &server_addr(addr));
    assert_eq!(endpoints[0].success_count(), 1);
    assert_eq!(endpoints[0].failure_count(), 0);

    client.close().await;
    assert!(client.endpoints().await.is_empty());
}
