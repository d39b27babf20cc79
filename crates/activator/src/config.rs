//! Configuration for the activation gateway.

use std::env;
use std::time::Duration;

/// Gateway configuration.
///
/// Constructed once at startup and carried inside the shared application
/// state; no component reads the environment after that.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Platform region the cluster lives in.
    pub region: String,
    /// Name of the cluster whose services this gateway manages.
    pub cluster: String,
    /// Bearer token for the platform APIs.
    pub api_token: Option<String>,
    /// Base URL of the cluster-orchestration API.
    pub orchestrator_url: String,
    /// Base URL of the virtual-network API.
    pub network_url: String,
    /// Port the activated backend services listen on.
    pub service_port: u16,
    /// Timeout for individual platform API requests, in seconds.
    pub request_timeout_secs: u64,
    /// Delay after a scale-up before the first task listing, in seconds.
    pub settle_delay_secs: u64,
    /// Delay between task status polls, in seconds.
    pub poll_interval_secs: u64,
    /// Number of status polls before the activation is reported as timed out.
    pub max_status_polls: u32,
}

impl Default for Config {
    fn default() -> Self {
        let region = env::var("PLATFORM_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        Self {
            port: env::var("ACTIVATOR_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cluster: env::var("PLATFORM_CLUSTER").unwrap_or_else(|_| "inference-pool".to_string()),
            api_token: env::var("PLATFORM_API_TOKEN").ok().filter(|s| !s.is_empty()),
            orchestrator_url: env::var("ORCHESTRATOR_API_URL")
                .unwrap_or_else(|_| format!("http://orchestrator.{region}.platform.internal")),
            network_url: env::var("NETWORK_API_URL")
                .unwrap_or_else(|_| format!("http://network.{region}.platform.internal")),
            service_port: env::var("BACKEND_SERVICE_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7860),
            request_timeout_secs: env::var("PLATFORM_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            settle_delay_secs: env::var("ACTIVATION_SETTLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            poll_interval_secs: env::var("ACTIVATION_POLL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6),
            max_status_polls: env::var("ACTIVATION_MAX_POLLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            region,
        }
    }
}

impl Config {
    /// Timings and addressing used by the activation workflow.
    #[must_use]
    pub fn activation_options(&self) -> crate::activation::ActivationOptions {
        crate::activation::ActivationOptions {
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_status_polls: self.max_status_polls,
            service_port: self.service_port,
        }
    }
}
