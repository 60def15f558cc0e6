use crate::config::GatewayConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by a status probe.
///
/// `NotFound` is deliberately its own variant so the scheduler can apply the
/// consecutive-miss policy; every other variant is treated as a transient
/// transport condition.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("subject not found")]
    NotFound,

    #[error("network error: {message}")]
    Network { message: String },

    #[error("gateway returned HTTP {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("malformed status payload: {message}")]
    Decode { message: String },
}

pub type ProbeResult = Result<StatusCheck, ProbeError>;

/// Raw result of a single status check, before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCheck {
    pub http_status: u16,
    pub raw_status: String,
    pub raw_payload: Option<JsonValue>,
}

/// The one operation the verification core requires from the storefront
/// backend. The core never initiates a payment through this trait; it only
/// asks what became of one.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn check_status(&self, subject_id: &str, is_top_up: bool) -> ProbeResult;
}

/// reqwest-backed probe against the storefront API.
pub struct HttpGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ProbeError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProbeError::Network {
                message: e.to_string(),
            })?;
        Ok(Self { config, http })
    }

    fn status_url(&self, subject_id: &str, is_top_up: bool) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if is_top_up {
            format!("{}/api/topups/{}/status", base, subject_id)
        } else {
            format!("{}/api/orders/{}/status", base, subject_id)
        }
    }
}

#[async_trait]
impl StatusProbe for HttpGateway {
    async fn check_status(&self, subject_id: &str, is_top_up: bool) -> ProbeResult {
        let url = self.status_url(subject_id, is_top_up);
        debug!(url = %url, "checking subject status");

        let mut request = self.http.get(&url);
        if let Some(token) = self.config.api_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ProbeError::Network {
            message: e.to_string(),
        })?;

        let http_status = response.status().as_u16();
        if http_status == 404 {
            return Err(ProbeError::NotFound);
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProbeError::Gateway {
                status: http_status,
                message,
            });
        }

        let payload: JsonValue = response.json().await.map_err(|e| ProbeError::Decode {
            message: e.to_string(),
        })?;
        let raw_status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(StatusCheck {
            http_status,
            raw_status,
            raw_payload: Some(payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gateway(base_url: &str) -> HttpGateway {
        HttpGateway::new(GatewayConfig {
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(5),
            api_token: None,
        })
        .expect("client builds")
    }

    #[test]
    fn order_and_top_up_use_distinct_endpoints() {
        let gw = gateway("https://shop.example");
        assert_eq!(
            gw.status_url("ord_42", false),
            "https://shop.example/api/orders/ord_42/status"
        );
        assert_eq!(
            gw.status_url("top_42", true),
            "https://shop.example/api/topups/top_42/status"
        );
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let gw = gateway("https://shop.example/");
        assert_eq!(
            gw.status_url("ord_1", false),
            "https://shop.example/api/orders/ord_1/status"
        );
    }

    #[test]
    fn probe_error_messages_identify_the_condition() {
        assert_eq!(ProbeError::NotFound.to_string(), "subject not found");
        let e = ProbeError::Gateway {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert!(e.to_string().contains("503"));
        assert!(e.to_string().contains("maintenance"));
    }

    #[test]
    fn status_check_deserializes_from_gateway_json() {
        let payload = serde_json::json!({
            "http_status": 200,
            "raw_status": "paid",
            "raw_payload": {"status": "paid", "items": 3}
        });
        let parsed: StatusCheck = serde_json::from_value(payload).expect("deserialize");
        assert_eq!(parsed.http_status, 200);
        assert_eq!(parsed.raw_status, "paid");
    }
}
