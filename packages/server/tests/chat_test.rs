//! Integration tests for the chat server over real TCP sockets.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use linechat_server::{Registry, Server, ServerConfig};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpSocket, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::oneshot,
    task::JoinHandle,
    time::{sleep, timeout},
};

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE_WINDOW: Duration = Duration::from_millis(200);

/// In-process server bound to an ephemeral port
struct TestServer {
    addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let server = Server::bind(&ServerConfig::default())
            .await
            .expect("Failed to bind server");
        let addr = server.local_addr().expect("Failed to read local address");
        let registry = server.registry();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            server
                .run_until(shutdown)
                .await
                .expect("Server loop failed");
        });

        TestServer {
            addr,
            registry,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Wait until the registry holds exactly `expected` connections
    async fn wait_for_members(&self, expected: usize) {
        let result = timeout(READ_TIMEOUT, async {
            while self.registry.len().await != expected {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            result.is_ok(),
            "Registry never reached {} members (now {})",
            expected,
            self.registry.len().await
        );
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.expect("Server task panicked");
        }
    }
}

/// Raw TCP participant
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect and send the nickname handshake
    async fn join(addr: SocketAddr, nickname: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        Self::handshake(stream, nickname).await
    }

    /// Connect with a small receive buffer so unread lines back up quickly
    async fn join_with_recv_buffer(addr: SocketAddr, nickname: &str, size: u32) -> Self {
        let socket = TcpSocket::new_v4().expect("Failed to create socket");
        socket
            .set_recv_buffer_size(size)
            .expect("Failed to set receive buffer size");
        let stream = socket.connect(addr).await.expect("Failed to connect");
        Self::handshake(stream, nickname).await
    }

    async fn handshake(stream: TcpStream, nickname: &str) -> Self {
        let (read_half, write_half) = stream.into_split();
        let mut client = TestClient {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        client.send_raw(&format!("{}\n", nickname)).await;
        client
    }

    async fn send_raw(&mut self, raw: &str) {
        self.writer
            .write_all(raw.as_bytes())
            .await
            .expect("Failed to write");
        self.writer.flush().await.expect("Failed to flush");
    }

    async fn send(&mut self, line: &str) {
        self.send_raw(&format!("{}\n", line)).await;
    }

    /// Next line exactly as it arrived on the wire, terminator included
    async fn recv_raw(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for a line")
            .expect("Failed to read");
        assert!(n > 0, "Server closed the connection");
        line
    }

    async fn recv(&mut self) -> String {
        self.recv_raw().await.trim_end_matches('\n').to_string()
    }

    /// Read until `expected` arrives, returning the lines that came before it
    async fn recv_until(&mut self, expected: &str, within: Duration) -> Vec<String> {
        let result = timeout(within, async {
            let mut skipped = Vec::new();
            loop {
                let mut line = String::new();
                let n = self.reader.read_line(&mut line).await.expect("Failed to read");
                assert!(n > 0, "Server closed the connection");
                let line = line.trim_end_matches('\n');
                if line == expected {
                    return skipped;
                }
                skipped.push(line.to_string());
            }
        })
        .await;
        result.unwrap_or_else(|_| panic!("Timed out waiting for {:?}", expected))
    }

    /// Assert that nothing arrives within a short window
    async fn expect_silence(&mut self) {
        let mut line = String::new();
        let result = timeout(SILENCE_WINDOW, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "Unexpected line received: {:?}", line);
    }
}

#[tokio::test]
async fn test_two_clients_exchange_messages_and_leave_notice() {
    // テスト項目: alice → bob の順で接続し、メッセージと退出通知が正しく届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    server.wait_for_members(1).await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    server.wait_for_members(2).await;
    assert_eq!(alice.recv().await, "bob joined the chat!");

    // when (操作):
    alice.send("hello").await;

    // then (期待する結果):
    // bob receives nothing retroactive; the first line is alice's message
    assert_eq!(bob.recv().await, "alice: hello");
    alice.expect_silence().await;

    // when (操作): bob disconnects
    drop(bob);

    // then (期待する結果):
    assert_eq!(alice.recv().await, "bob left the chat.");
    server.wait_for_members(1).await;

    server.stop().await;
}

#[tokio::test]
async fn test_message_reaches_everyone_but_sender() {
    // テスト項目: 3 人接続時、bob のメッセージは alice と carol にだけ届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    server.wait_for_members(1).await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    server.wait_for_members(2).await;
    let mut carol = TestClient::join(server.addr, "carol").await;
    server.wait_for_members(3).await;

    assert_eq!(alice.recv().await, "bob joined the chat!");
    assert_eq!(alice.recv().await, "carol joined the chat!");
    assert_eq!(bob.recv().await, "carol joined the chat!");

    // when (操作):
    bob.send("hi").await;

    // then (期待する結果):
    assert_eq!(alice.recv().await, "bob: hi");
    assert_eq!(carol.recv().await, "bob: hi");
    bob.expect_silence().await;

    server.stop().await;
}

#[tokio::test]
async fn test_handshake_failure_produces_no_notices() {
    // テスト項目: ニックネーム送信前に切断した接続は参加・退出通知を発生させない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    server.wait_for_members(1).await;

    // when (操作):
    let silent = TcpStream::connect(server.addr)
        .await
        .expect("Failed to connect");
    drop(silent);
    alice.expect_silence().await;
    let _carol = TestClient::join(server.addr, "carol").await;

    // then (期待する結果):
    assert_eq!(alice.recv().await, "carol joined the chat!");
    server.wait_for_members(2).await;

    server.stop().await;
}

#[tokio::test]
async fn test_trailing_terminators_are_normalized() {
    // テスト項目: 送信側の末尾改行の数によらず、受信側には改行 1 つで届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    server.wait_for_members(1).await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    server.wait_for_members(2).await;
    assert_eq!(alice.recv().await, "bob joined the chat!");

    // when (操作):
    alice.send_raw("hello\r\n\n\n").await;
    alice.send_raw("next\n").await;

    // then (期待する結果):
    assert_eq!(bob.recv_raw().await, "alice: hello\n");
    assert_eq!(bob.recv_raw().await, "alice: next\n");

    server.stop().await;
}

#[tokio::test]
async fn test_membership_tracks_connects_and_disconnects() {
    // テスト項目: Registry のメンバー数はハンドシェイク済みかつ未削除の接続数と一致する
    // given (前提条件):
    let server = TestServer::start().await;
    let alice = TestClient::join(server.addr, "alice").await;
    let bob = TestClient::join(server.addr, "bob").await;
    let carol = TestClient::join(server.addr, "carol").await;
    server.wait_for_members(3).await;

    // when (操作):
    drop(bob);
    server.wait_for_members(2).await;
    drop(alice);
    drop(carol);

    // then (期待する結果):
    server.wait_for_members(0).await;
    assert!(server.registry.is_empty().await);

    server.stop().await;
}

#[tokio::test]
async fn test_messages_from_one_sender_keep_their_order() {
    // テスト項目: 同じ送信者のメッセージは送信順に届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    server.wait_for_members(1).await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    server.wait_for_members(2).await;
    assert_eq!(alice.recv().await, "bob joined the chat!");

    // when (操作):
    for i in 0..20 {
        alice.send(&format!("line {}", i)).await;
    }

    // then (期待する結果):
    for i in 0..20 {
        assert_eq!(bob.recv().await, format!("alice: line {}", i));
    }

    server.stop().await;
}

#[tokio::test]
async fn test_peer_that_never_reads_does_not_block_others() {
    // テスト項目: 受信しない参加者がいても、他の参加者同士のメッセージは遅延なく届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    server.wait_for_members(1).await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    server.wait_for_members(2).await;
    // carol never reads anything after joining
    let _carol = TestClient::join_with_recv_buffer(server.addr, "carol", 4096).await;
    server.wait_for_members(3).await;
    let mut dave = TestClient::join(server.addr, "dave").await;
    server.wait_for_members(4).await;
    alice.recv_until("dave joined the chat!", READ_TIMEOUT).await;

    // dave floods the room with long lines
    let filler = "x".repeat(1000);
    let relayed_filler = format!("dave: {}", filler);
    let flood = tokio::spawn(async move {
        for _ in 0..8000 {
            dave.send(&filler).await;
        }
        dave
    });
    alice.recv_until(&relayed_filler, READ_TIMEOUT).await;

    // when (操作):
    bob.send_raw("ping1\nping2\n").await;

    // then (期待する結果):
    let within = Duration::from_secs(10);
    let skipped = alice.recv_until("bob: ping1", within).await;
    assert!(skipped.iter().all(|line| line.starts_with("dave: ")));
    let skipped = alice.recv_until("bob: ping2", within).await;
    assert!(skipped.iter().all(|line| line.starts_with("dave: ")));
    assert_eq!(server.registry.len().await, 4);

    flood.abort();
    server.stop().await;
}

#[tokio::test]
async fn test_write_failure_racing_disconnect_announces_leave_once() {
    // テスト項目: 切断した参加者への送信失敗と、その参加者自身の切断処理が競合しても退出通知は 1 回だけ
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    server.wait_for_members(1).await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    server.wait_for_members(2).await;
    let carol = TestClient::join(server.addr, "carol").await;
    server.wait_for_members(3).await;
    alice.recv_until("carol joined the chat!", READ_TIMEOUT).await;
    bob.recv_until("carol joined the chat!", READ_TIMEOUT).await;

    // when (操作):
    drop(carol);
    for i in 0..50 {
        alice.send(&format!("burst {}", i)).await;
    }
    server.wait_for_members(2).await;
    alice.send("done").await;

    // then (期待する結果):
    let mut seen = bob.recv_until("alice: done", READ_TIMEOUT).await;
    if !seen.iter().any(|line| line == "carol left the chat.") {
        bob.recv_until("carol left the chat.", READ_TIMEOUT).await;
        seen.push("carol left the chat.".to_string());
    }
    bob.expect_silence().await;
    let leaves = seen
        .iter()
        .filter(|line| line.as_str() == "carol left the chat.")
        .count();
    assert_eq!(leaves, 1);
    assert_eq!(server.registry.nicknames().await, vec!["alice", "bob"]);

    server.stop().await;
}
