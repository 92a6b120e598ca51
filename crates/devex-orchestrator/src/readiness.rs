// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Readiness prober.
//!
//! Polls a runner's ping endpoint until it answers with the exact sentinel
//! body. Anything else (transport errors, other status codes, other bodies)
//! is logged and retried until the deadline.

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::poll::{Poll, PollError, PollPolicy, poll_until};

/// Body a ready runner returns from its ping endpoint.
pub const READY_SENTINEL: &str = "\"pong\"\n";

/// HTTP readiness prober.
#[derive(Clone)]
pub struct ReadinessProber {
    client: Client,
}

impl ReadinessProber {
    /// Build a prober. Certificate validation is disabled.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    /// Probe `url` every `policy.interval` until it returns the sentinel.
    ///
    /// Returns the number of probes made.
    pub async fn await_ready(&self, url: &str, policy: PollPolicy) -> Result<u32> {
        info!(url = %url, timeout = ?policy.timeout, "Waiting for environment to become ready");

        let result = poll_until(policy, |attempt| {
            let client = &self.client;
            async move {
                let response = match client.get(url).timeout(policy.interval).send().await {
                    Ok(response) => response,
                    Err(e) => {
                        debug!(url = %url, attempt, error = %e, "Probe failed");
                        return Ok::<_, Error>(Poll::Pending);
                    }
                };
                let status = response.status();
                match response.text().await {
                    Ok(body) if body == READY_SENTINEL => Ok(Poll::Ready(attempt)),
                    Ok(body) => {
                        debug!(
                            url = %url,
                            attempt,
                            status = %status,
                            body_len = body.len(),
                            "Not ready yet"
                        );
                        Ok(Poll::Pending)
                    }
                    Err(e) => {
                        debug!(url = %url, attempt, error = %e, "Probe body unreadable");
                        Ok(Poll::Pending)
                    }
                }
            }
        })
        .await;

        match result {
            Ok(attempts) => {
                info!(url = %url, attempts, "Environment ready");
                Ok(attempts)
            }
            Err(PollError::TimedOut { attempts }) => {
                warn!(url = %url, attempts, "Environment did not become ready");
                Err(Error::Timeout {
                    what: format!("readiness of {}", url),
                    after: policy.timeout,
                })
            }
            Err(PollError::Aborted(e)) => Err(e),
        }
    }
}
