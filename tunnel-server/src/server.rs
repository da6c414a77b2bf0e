use std::convert::Infallible;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::handlers::dispatch;
use crate::registry::Registry;

/// Accepts TCP connections forever, terminates TLS on each, and serves
/// HTTP/1.1 requests off it with the tunnel dispatcher. Accept and handshake
/// failures are logged and never bring the listener down.
pub async fn run(listener: TcpListener, acceptor: TlsAcceptor, registry: Arc<Registry>) {
    loop {
        let (stream, from) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                log::warn!("Error accepting incoming connection: {error}");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let registry = Arc::clone(&registry);

        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(tls_stream) => tls_stream,
                Err(error) => {
                    log::warn!("TLS handshake with {from} failed: {error}");
                    return;
                }
            };

            let io = TokioIo::new(tls_stream);
            let service = service_fn(move |request| {
                let registry = Arc::clone(&registry);
                async move { Ok::<_, Infallible>(dispatch(&registry, request).await) }
            });

            if let Err(error) = hyper::server::conn::http1::Builder::new().serve_connection(io, service).await {
                log::debug!("Connection from {from} ended: {error}");
            }
        });
    }
}
