use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TrampolineError};
use crate::models::InstanceStatus;

pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TrampolineError::HealthCheck(e.to_string()))
}

/// GET `url`; any successful response means the instance is up.
pub async fn probe(client: &reqwest::Client, url: &str) -> InstanceStatus {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status);
    match response {
        Ok(_) => InstanceStatus::Deployed,
        Err(e) => {
            debug!(url, "health probe failed: {e}");
            InstanceStatus::NotDeployed
        }
    }
}
