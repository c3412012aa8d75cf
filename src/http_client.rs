use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;

/// Client used for every bypass probe.
///
/// Redirects are never followed: a 3xx is itself the signal we record.
pub fn create_bypass_client(config: &Config) -> Result<Client> {
    let client = ClientBuilder::new()
        // Connection pooling - probes for one target hit the same host back to back
        .pool_max_idle_per_host(config.concurrency.max(1) * 2)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .tcp_nodelay(true)

        // Timeouts
        .timeout(config.timeout())
        .connect_timeout(config.timeout().min(Duration::from_secs(5)))

        // Compression
        .gzip(true)
        .brotli(true)

        // TLS
        .use_rustls_tls()
        .tls_sni(true)
        .https_only(false)

        .redirect(reqwest::redirect::Policy::none())
        .user_agent(config.user_agent.as_str())

        // Disable certificate validation for pentesting (ONLY for security research!)
        .danger_accept_invalid_certs(true)

        .build()?;
    Ok(client)
}
