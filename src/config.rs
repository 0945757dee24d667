//! Configuration types.

use std::time::Duration;

/// Verification gateway connection configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the verification service.
    pub base_url: String,
    /// Deadline applied to every gateway call.
    pub call_deadline: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            call_deadline: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Build from environment (`KYC_GATEWAY_URL`, `KYC_CALL_DEADLINE_SECS`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("KYC_GATEWAY_URL") {
            config.base_url = url;
        }
        if let Ok(secs) = std::env::var("KYC_CALL_DEADLINE_SECS")
            && let Ok(secs) = secs.parse()
        {
            config.call_deadline = Duration::from_secs(secs);
        }
        config
    }
}

/// Challenge-capture burst configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum frames acquired per burst.
    pub frames_per_burst: usize,
    /// Spacing between frame acquisitions.
    pub frame_interval: Duration,
    /// Slack on top of the nominal burst window before the burst is
    /// abandoned as timed out.
    pub burst_grace: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_per_burst: 6,
            frame_interval: Duration::from_millis(400), // ~2.4s window
            burst_grace: Duration::from_secs(2),
        }
    }
}

impl CaptureConfig {
    /// Hard deadline for acquiring one full burst (submission has its own
    /// gateway-level deadline).
    pub fn burst_deadline(&self) -> Duration {
        self.frame_interval * self.frames_per_burst as u32 + self.burst_grace
    }
}
