use reqwest::Client;
use tokio::net::{TcpListener, TcpStream};

use crate::session;

/// Accepts local TCP connections forever, spawning an independent session
/// for each one. Accept failures are logged and do not terminate the
/// listener.
pub async fn run(listener: TcpListener, http: Client, server_url: String, destination: String) {
    loop {
        let (stream, from) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                log::warn!("Error accepting incoming connection: {error}");
                continue;
            }
        };

        if let Err(error) = enable_keepalive(&stream) {
            log::warn!("Couldn't enable keepalive for connection from {from}: {error}");
        }

        log::info!("Accepted local connection from {from}");

        let http = http.clone();
        let server_url = server_url.clone();
        let destination = destination.clone();
        tokio::spawn(async move {
            session::run(stream, http, &server_url, &destination).await;
        });
    }
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    socket2::SockRef::from(stream).set_keepalive(true)
}
