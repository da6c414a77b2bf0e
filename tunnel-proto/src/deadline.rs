use std::time::Duration;

use tokio::io::{self, AsyncReadExt};

/// Outcome of [`read_with_deadline`]. See module docs for the classification
/// contract.
#[derive(Debug)]
pub enum ReadOutcome {
    /// `n` bytes were read before the deadline elapsed.
    Data(usize),
    /// The deadline elapsed without any bytes becoming available. Not an
    /// error: callers should simply try again.
    DeadlineEmpty,
    /// The peer closed its side of the connection.
    Closed,
    /// Any other I/O error.
    Error(io::Error),
}

/// Performs a single non-blocking read against `stream`, classifying the
/// result as one of [`ReadOutcome`]'s four cases.
///
/// The deadline is a hard upper bound on the wall-clock time spent inside
/// this call: a timeout with zero bytes read returns `DeadlineEmpty`, never
/// `Error`. This is the one primitive both the client's upstream loop (local
/// socket) and the server's GET handler (destination socket) use to bound a
/// blocking read.
pub async fn read_with_deadline<S>(stream: &mut S, buf: &mut [u8], deadline: Duration) -> ReadOutcome
where
    S: AsyncReadExt + Unpin,
{
    match tokio::time::timeout(deadline, stream.read(buf)).await {
        Ok(Ok(0)) => ReadOutcome::Closed,
        Ok(Ok(n)) => ReadOutcome::Data(n),
        Ok(Err(error)) => ReadOutcome::Error(error),
        Err(_elapsed) => ReadOutcome::DeadlineEmpty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    fn pair() -> (DuplexStream, DuplexStream) {
        tokio::io::duplex(4096)
    }

    #[tokio::test]
    async fn returns_data_when_available() {
        let (mut a, mut b) = pair();
        b.write_all(b"hello").await.unwrap();

        let mut buf = [0u8; 16];
        match read_with_deadline(&mut a, &mut buf, Duration::from_secs(1)).await {
            ReadOutcome::Data(n) => assert_eq!(&buf[..n], b"hello"),
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn returns_deadline_empty_when_nothing_arrives() {
        let (mut a, _b) = pair();
        let mut buf = [0u8; 16];
        match read_with_deadline(&mut a, &mut buf, Duration::from_millis(20)).await {
            ReadOutcome::DeadlineEmpty => {}
            other => panic!("expected DeadlineEmpty, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn returns_closed_on_peer_close() {
        let (mut a, b) = pair();
        drop(b);
        let mut buf = [0u8; 16];
        match read_with_deadline(&mut a, &mut buf, Duration::from_secs(1)).await {
            ReadOutcome::Closed => {}
            other => panic!("expected Closed, got {other:?}"),
        }
    }
}

impl std::fmt::Display for ReadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadOutcome::Data(n) => write!(f, "{n} bytes"),
            ReadOutcome::DeadlineEmpty => write!(f, "deadline elapsed, no data"),
            ReadOutcome::Closed => write!(f, "connection closed"),
            ReadOutcome::Error(e) => write!(f, "error: {e}"),
        }
    }
}
