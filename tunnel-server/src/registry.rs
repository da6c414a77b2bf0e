use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use tunnel_proto::{read_with_deadline, ConnectionId, ReadOutcome, WINDOW_SIZE};

/// One live tunnel, from successful POST to DELETE or eviction. The
/// destination socket is split into independent read and write halves, each
/// behind its own lock: a GET's read (which can block up to `READ_DEADLINE`)
/// must never hold up a concurrent PUT's write, or vice versa. The read
/// half's lock is what serializes overlapping GETs for this identifier
/// against the shared read buffer.
pub struct ServerSession {
    read_half: Mutex<ReadSide>,
    write_half: Mutex<OwnedWriteHalf>,
}

struct ReadSide {
    stream: OwnedReadHalf,
    buf: Vec<u8>,
}

impl ServerSession {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            read_half: Mutex::new(ReadSide {
                stream: read_half,
                buf: vec![0u8; WINDOW_SIZE],
            }),
            write_half: Mutex::new(write_half),
        }
    }

    pub async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut write_half = self.write_half.lock().await;
        write_half.write_all(data).await
    }

    /// Performs one non-blocking read of up to one window, returning the
    /// classification and a copy of whatever bytes were read. Holding the
    /// read lock for the whole call is what serializes overlapping GETs for
    /// this identifier against the shared buffer; it is independent of
    /// `write_all`'s lock, so PUTs never queue behind an in-flight GET.
    pub async fn read_window_bytes(&self, deadline: Duration) -> (ReadOutcome, Vec<u8>) {
        let mut read_half = self.read_half.lock().await;
        let ReadSide { stream, buf } = &mut *read_half;
        let outcome = read_with_deadline(stream, buf, deadline).await;
        let bytes = match outcome {
            ReadOutcome::Data(n) => buf[..n].to_vec(),
            _ => Vec::new(),
        };
        (outcome, bytes)
    }
}

/// Process-wide map from connection identifier to live session. All
/// operations are serialized through one `tokio::sync::Mutex`, generalizing
/// the `Mutex<HashMap<..>>` registry pattern a comparable relay server in the
/// example pack already uses.
#[derive(Default)]
pub struct Registry {
    sessions: Mutex<HashMap<ConnectionId, Arc<ServerSession>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session` under `id` unless one is already registered.
    /// Returns `false` (and leaves the existing entry untouched) on
    /// conflict, so the caller can respond `409`.
    pub async fn insert(&self, id: ConnectionId, session: Arc<ServerSession>) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&id) {
            return false;
        }
        sessions.insert(id, session);
        true
    }

    pub async fn lookup(&self, id: &ConnectionId) -> Option<Arc<ServerSession>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Removes the entry for `id`, if any. Dropping the `ServerSession`
    /// closes its destination socket. Returns whether an entry was present.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let accept = listener.accept();
        let (client, (server, _)) = tokio::join!(connect, accept);
        (client.unwrap(), server.unwrap())
    }

    #[tokio::test]
    async fn insert_lookup_remove_round_trip() {
        let registry = Registry::new();
        let id = ConnectionId::generate();
        let (_client, server) = loopback_pair().await;
        let session = Arc::new(ServerSession::new(server));

        assert!(registry.insert(id, session).await);
        assert!(registry.lookup(&id).await.is_some());
        assert!(registry.remove(&id).await);
        assert!(registry.lookup(&id).await.is_none());
    }

    #[tokio::test]
    async fn double_insert_is_rejected() {
        let registry = Registry::new();
        let id = ConnectionId::generate();

        let (_c1, s1) = loopback_pair().await;
        let (_c2, s2) = loopback_pair().await;

        assert!(registry.insert(id, Arc::new(ServerSession::new(s1))).await);
        assert!(!registry.insert(id, Arc::new(ServerSession::new(s2))).await);
    }

    #[tokio::test]
    async fn remove_of_unknown_identifier_is_idempotent() {
        let registry = Registry::new();
        let id = ConnectionId::generate();
        assert!(!registry.remove(&id).await);
    }

    #[tokio::test]
    async fn write_then_read_sees_the_bytes() {
        let registry = Registry::new();
        let id = ConnectionId::generate();
        let (mut client, server) = loopback_pair().await;
        let session = Arc::new(ServerSession::new(server));
        registry.insert(id, Arc::clone(&session)).await;

        client.write_all(b"hello").await.unwrap();

        let (outcome, bytes) = session.read_window_bytes(Duration::from_secs(1)).await;
        assert!(matches!(outcome, ReadOutcome::Data(5)));
        assert_eq!(bytes, b"hello");
    }
}
