use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

static LIVE_SERVICES: OnceCell<Client> = OnceCell::new();

/// Client shared by the login exchange and every live-services call.
///
/// Requests still set their own `User-Agent` header; the builder default only
/// covers calls made before configuration is known.
pub fn http_client() -> Result<&'static Client> {
    LIVE_SERVICES.get_or_try_init(|| {
        Client::builder()
            .https_only(true)
            .user_agent(concat!("tm_wrapped/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .build()
            .context("build live-services http client")
    })
}
