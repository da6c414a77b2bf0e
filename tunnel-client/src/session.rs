use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use tunnel_proto::{read_with_deadline, ConnectionId, ReadOutcome, MAX_CONSECUTIVE_FAILURES, READ_DEADLINE, WINDOW_SIZE};

/// Runs one client session end to end: announces `destination` to the
/// tunnel server, then drives the upstream and downstream loops until
/// either side decides the session is over.
pub async fn run(local_socket: TcpStream, http: Client, server_url: &str, destination: &str) {
    let id = ConnectionId::generate();
    let base_url = format!("{server_url}/{id}");

    log::info!("Opening connection {id} for {destination}");

    let response = match http.post(&base_url).body(destination.to_string()).send().await {
        Ok(response) => response,
        Err(error) => {
            log::warn!("Connection {id}: failed to reach tunnel server: {error}");
            return;
        }
    };

    match response.status() {
        StatusCode::CREATED => {}
        StatusCode::INTERNAL_SERVER_ERROR => {
            log::error!("Connection {id}: server failed to open {destination}: 500 Internal Server Error");
            return;
        }
        other => {
            log::warn!("Connection {id}: unexpected status from POST: {other}");
            return;
        }
    }

    let connected = Arc::new(AtomicBool::new(true));
    let (read_half, write_half) = local_socket.into_split();

    let downstream = tokio::spawn(downstream_loop(
        http.clone(),
        base_url.clone(),
        id,
        write_half,
        Arc::clone(&connected),
    ));
    let upstream = tokio::spawn(upstream_loop(http, base_url, id, read_half, connected));

    let (_, _) = tokio::join!(downstream, upstream);
    log::info!("Connection {id} closed");
}

async fn downstream_loop(http: Client, base_url: String, id: ConnectionId, mut write_half: OwnedWriteHalf, connected: Arc<AtomicBool>) {
    let mut failures = 0u32;

    while connected.load(Ordering::Acquire) {
        let response = match http.get(&base_url).send().await {
            Ok(response) => response,
            Err(error) => {
                failures += 1;
                log::debug!("Connection {id}: GET transport error ({failures}/{MAX_CONSECUTIVE_FAILURES}): {error}");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    connected.store(false, Ordering::Release);
                }
                continue;
            }
        };

        match response.status() {
            StatusCode::OK => {
                failures = 0;
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(error) => {
                        log::warn!("Connection {id}: failed to read GET body: {error}");
                        connected.store(false, Ordering::Release);
                        break;
                    }
                };

                if let Err(error) = write_half.write_all(&body).await {
                    log::warn!("Connection {id}: failed to write to local socket: {error}");
                    connected.store(false, Ordering::Release);
                    break;
                }
            }
            StatusCode::NO_CONTENT => {}
            StatusCode::GONE => {
                log::info!("Connection {id}: destination closed");
                connected.store(false, Ordering::Release);
                break;
            }
            other => {
                log::warn!("Connection {id}: unexpected status from GET: {other}");
                connected.store(false, Ordering::Release);
                break;
            }
        }
    }
}

async fn upstream_loop(http: Client, base_url: String, id: ConnectionId, mut read_half: OwnedReadHalf, connected: Arc<AtomicBool>) {
    let mut buf = vec![0u8; WINDOW_SIZE];
    let mut failures = 0u32;

    while connected.load(Ordering::Acquire) {
        match read_with_deadline(&mut read_half, &mut buf, READ_DEADLINE).await {
            ReadOutcome::Data(n) => {
                failures = 0;
                if let Err(error) = http.put(&base_url).body(buf[..n].to_vec()).send().await {
                    log::debug!("Connection {id}: PUT transport error: {error}");
                }
            }
            ReadOutcome::DeadlineEmpty => {}
            ReadOutcome::Closed => {
                log::info!("Connection {id}: local connection closed");
                if let Err(error) = http.delete(&base_url).send().await {
                    log::debug!("Connection {id}: DELETE failed, ignoring: {error}");
                }
                connected.store(false, Ordering::Release);
                break;
            }
            ReadOutcome::Error(error) => {
                failures += 1;
                log::debug!("Connection {id}: local read error ({failures}/{MAX_CONSECUTIVE_FAILURES}): {error}");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    connected.store(false, Ordering::Release);
                }
            }
        }
    }
}
