//! Evolution API (WhatsApp) gateway over blocking HTTP.
//!
//! # Responsibility
//! - Map `MessageGateway` calls onto Evolution REST endpoints.
//! - Normalize phone numbers into the gateway's digits-only format.
//!
//! # Invariants
//! - Every request carries the configured `apikey` header.
//! - Every request is bounded by `GatewayConfig::request_timeout`.

use crate::config::GatewayConfig;
use crate::notify::gateway::{GatewayError, MessageGateway};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static NON_DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("valid digit regex"));

const API_KEY_HEADER: &str = "apikey";

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<Value>,
    response: Option<Box<ErrorBody>>,
}

impl ErrorBody {
    fn message_text(&self) -> Option<String> {
        let own = self.message.as_ref().and_then(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        own.filter(|text| !text.is_empty()).or_else(|| {
            self.response
                .as_ref()
                .and_then(|nested| nested.message_text())
        })
    }
}

/// `MessageGateway` backed by an Evolution API instance.
#[derive(Debug, Clone)]
pub struct EvolutionGateway {
    client: Client,
    config: GatewayConfig,
}

impl EvolutionGateway {
    /// Builds the HTTP client for `config`.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let config = GatewayConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn send_text_url(&self) -> String {
        format!(
            "{}/message/sendText/{}",
            self.config.base_url, self.config.instance
        )
    }

    fn fetch_instances_url(&self) -> String {
        format!("{}/instance/fetchInstances", self.config.base_url)
    }
}

impl MessageGateway for EvolutionGateway {
    fn probe_availability(&self) -> bool {
        if !self.config.is_configured() {
            warn!("event=gateway_probe module=notify status=unavailable reason=missing_api_key");
            return false;
        }

        match self
            .client
            .get(self.fetch_instances_url())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .send()
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    "event=gateway_probe module=notify status=unavailable http_status={}",
                    response.status().as_u16()
                );
                false
            }
            Err(err) => {
                warn!("event=gateway_probe module=notify status=unavailable error={err}");
                false
            }
        }
    }

    fn send_one(&self, address: &str, text: &str) -> Result<(), GatewayError> {
        if !self.config.is_configured() {
            return Err(GatewayError::NotConfigured);
        }
        let number = format_phone_number(address, &self.config.default_country_code)?;

        let response = self
            .client
            .post(self.send_text_url())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&SendTextRequest {
                number: number.as_str(),
                text,
            })
            .send()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .ok()
                .and_then(|body| body.message_text())
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .map(|_| ())
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

/// Formats a phone number into the gateway's digits-only form.
///
/// Non-digits are stripped and `country_code` is prefixed when the number
/// does not already start with it: `"(27) 99999-1234"` -> `"5527999991234"`.
pub fn format_phone_number(raw: &str, country_code: &str) -> Result<String, GatewayError> {
    let digits = NON_DIGIT_RE.replace_all(raw, "");
    if digits.is_empty() {
        return Err(GatewayError::InvalidAddress(raw.to_string()));
    }
    if digits.starts_with(country_code) {
        return Ok(digits.into_owned());
    }
    Ok(format!("{country_code}{digits}"))
}
