use std::time::Duration;

use anyhow::Context;
use reqwest::Client;

/// Cap on one whole upstream round-trip.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by all requests to one upstream provider.
///
/// Standard proxy environment variables are honored by reqwest itself.
pub(crate) fn upstream_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(TCP_KEEPALIVE))
        .build()
        .context("build upstream HTTP client")
}
