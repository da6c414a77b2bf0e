use tunnel_proto::REQUEST_TIMEOUT;

/// Builds the `reqwest::Client` shared by every session. Certificates are
/// accepted without verification: this client only ever talks to a tunnel
/// server the operator pointed it at, typically over a self-signed
/// certificate, and the 30-day self-signed mode has no chain for a real
/// verifier to check against anyway.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(REQUEST_TIMEOUT)
        .build()
}
