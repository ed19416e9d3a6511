//! HTTP clients for the broker/state/scheduler sidecar.
//!
//! All four surfaces share one connection-pooled `reqwest::Client` with a
//! 5 s timeout; the clients are constructed once at startup and passed
//! explicitly to the services that need them.

mod invoke;
mod jobs;
mod pubsub;
mod state;

pub use invoke::InvocationClient;
pub use jobs::JobsClient;
pub use pubsub::EventPublisher;
pub use state::StateClient;

use std::time::Duration;

pub const SIDECAR_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the sidecar HTTP client every surface shares.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(SIDECAR_TIMEOUT)
        .pool_max_idle_per_host(10)
        .tcp_nodelay(true)
        .build()
}
