use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use tokio::net::TcpStream;

use tunnel_proto::{ConnectionId, ReadOutcome, READ_DEADLINE};

use crate::registry::{Registry, ServerSession};

pub type TunnelResponse = Response<Full<Bytes>>;

/// Routes one HTTPS request by path (the connection identifier) and method.
/// Never fails: anything that would be a hard error is folded into a status
/// code, matching the dispatcher's contract in full.
pub async fn dispatch(registry: &Registry, request: Request<Incoming>) -> TunnelResponse {
    let id: ConnectionId = match request.uri().path().trim_start_matches('/').parse() {
        Ok(id) => id,
        Err(_) => return empty(StatusCode::NOT_FOUND),
    };

    match *request.method() {
        Method::POST => handle_post(registry, id, request).await,
        Method::PUT => handle_put(registry, id, request).await,
        Method::GET => handle_get(registry, id).await,
        Method::DELETE => handle_delete(registry, id).await,
        _ => empty(StatusCode::NOT_FOUND),
    }
}

async fn handle_post(registry: &Registry, id: ConnectionId, request: Request<Incoming>) -> TunnelResponse {
    let body = match collect_body(request).await {
        Ok(body) => body,
        Err(error) => {
            log::warn!("connection {id}: failed to read POST body: {error}");
            return empty(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let destination = match std::str::from_utf8(&body) {
        Ok(destination) => destination,
        Err(_) => {
            log::warn!("connection {id}: POST body is not valid UTF-8");
            return empty(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let stream = match TcpStream::connect(destination).await {
        Ok(stream) => stream,
        Err(error) => {
            log::warn!("connection {id}: failed to dial {destination}: {error}");
            return empty(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if let Err(error) = enable_keepalive(&stream) {
        log::warn!("connection {id}: couldn't enable keepalive on destination socket: {error}");
    }

    if !registry.insert(id, Arc::new(ServerSession::new(stream))).await {
        log::warn!("connection {id}: POST on an identifier that is already registered");
        return empty(StatusCode::CONFLICT);
    }

    log::info!("connection {id}: opened tunnel to {destination}");
    empty(StatusCode::CREATED)
}

async fn handle_put(registry: &Registry, id: ConnectionId, request: Request<Incoming>) -> TunnelResponse {
    let Some(session) = registry.lookup(&id).await else {
        return empty(StatusCode::NOT_FOUND);
    };

    let body = match collect_body(request).await {
        Ok(body) => body,
        Err(error) => {
            log::warn!("connection {id}: failed to read PUT body: {error}");
            return empty(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if let Err(error) = session.write_all(&body).await {
        log::warn!("connection {id}: destination write failed: {error}");
        return empty(StatusCode::INTERNAL_SERVER_ERROR);
    }

    empty(StatusCode::OK)
}

async fn handle_get(registry: &Registry, id: ConnectionId) -> TunnelResponse {
    let Some(session) = registry.lookup(&id).await else {
        return empty(StatusCode::NOT_FOUND);
    };

    let (outcome, bytes) = session.read_window_bytes(READ_DEADLINE).await;
    match outcome {
        ReadOutcome::Data(_) => respond(StatusCode::OK, bytes),
        ReadOutcome::DeadlineEmpty => empty(StatusCode::NO_CONTENT),
        ReadOutcome::Closed => {
            // The client's downstream loop never issues a DELETE on its own
            // (only local EOF does); evict here so the identifier doesn't
            // linger in the registry after the destination is gone.
            registry.remove(&id).await;
            log::info!("connection {id}: destination closed");
            empty(StatusCode::GONE)
        }
        ReadOutcome::Error(error) => {
            log::warn!("connection {id}: destination read failed: {error}");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn handle_delete(registry: &Registry, id: ConnectionId) -> TunnelResponse {
    if registry.remove(&id).await {
        log::info!("connection {id}: closed by client");
    }
    empty(StatusCode::OK)
}

async fn collect_body(request: Request<Incoming>) -> Result<Bytes, hyper::Error> {
    Ok(request.into_body().collect().await?.to_bytes())
}

fn respond(status: StatusCode, body: impl Into<Bytes>) -> TunnelResponse {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .expect("status and empty headers always form a valid response")
}

fn empty(status: StatusCode) -> TunnelResponse {
    respond(status, Bytes::new())
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    socket2::SockRef::from(stream).set_keepalive(true)
}
