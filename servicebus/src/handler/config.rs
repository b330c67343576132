use super::errors::{ServiceBusError, ServiceBusResult};
use super::retry::RetryPolicy;
use crate::common::constants::{
    DEFAULT_ENCODING, DEFAULT_RETRY_BACKOFF_FACTOR, DEFAULT_RETRY_BACKOFF_MAX, DEFAULT_RETRY_TOTAL,
};
use crate::utils::{EnvUtils, EnvVarError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the delay between attempts grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Every retry waits `retry_backoff_factor` seconds.
    Fixed,
    /// Retry `n` waits `retry_backoff_factor * 2^n` seconds.
    #[default]
    Exponential,
}

impl FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(RetryMode::Fixed),
            "exponential" => Ok(RetryMode::Exponential),
            other => Err(format!("unknown retry mode '{other}'")),
        }
    }
}

/// Wire transport used by the AMQP collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// AMQP over TCP, port 5671.
    #[default]
    Amqp,
    /// AMQP over WebSockets, port 443.
    AmqpOverWebsocket,
}

impl FromStr for TransportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amqp" => Ok(TransportType::Amqp),
            "amqp_over_websocket" | "amqpoverwebsocket" => Ok(TransportType::AmqpOverWebsocket),
            other => Err(format!("unknown transport type '{other}'")),
        }
    }
}

/// User-facing handler options.
///
/// Every field has a default, so partial documents deserialize cleanly.
///
/// # Examples
///
/// ```no_run
/// use servicebus::handler::{HandlerOptions, RetryMode};
///
/// let options: HandlerOptions = serde_json::from_str(r#"{
///     "retry_total": 5,
///     "retry_mode": "fixed",
///     "subscription_name": "audit"
/// }"#)?;
/// assert_eq!(options.retry_mode, RetryMode::Fixed);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerOptions {
    pub transport_type: TransportType,
    /// Number of retries after the first attempt.
    pub retry_total: u32,
    pub retry_mode: RetryMode,
    /// Base backoff in seconds.
    pub retry_backoff_factor: f64,
    /// Upper bound of a single backoff in seconds.
    pub retry_backoff_max: f64,
    /// Encoding of management node addresses.
    pub encoding: String,
    /// Prepended to the generated user agent.
    pub user_agent: Option<String>,
    /// Alternative endpoint (e.g. a proxy) used to reach the service.
    pub custom_endpoint_address: Option<String>,
    /// Targets `{entity}/Subscriptions/{name}` instead of the entity itself.
    pub subscription_name: Option<String>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            transport_type: TransportType::default(),
            retry_total: DEFAULT_RETRY_TOTAL,
            retry_mode: RetryMode::default(),
            retry_backoff_factor: DEFAULT_RETRY_BACKOFF_FACTOR,
            retry_backoff_max: DEFAULT_RETRY_BACKOFF_MAX,
            encoding: DEFAULT_ENCODING.to_string(),
            user_agent: None,
            custom_endpoint_address: None,
            subscription_name: None,
        }
    }
}

impl HandlerOptions {
    /// Default options overlaid with `SERVICEBUS_*` environment variables.
    pub fn from_env() -> ServiceBusResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlays the recognised `SERVICEBUS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceBusError::ConfigurationError`] if a variable is set
    /// to a value that does not parse.
    pub fn with_env_overrides(mut self) -> ServiceBusResult<Self> {
        if let Some(value) = EnvUtils::get_optional_parsed_var("SERVICEBUS_RETRY_TOTAL")
            .map_err(env_error)?
        {
            self.retry_total = value;
        }
        if let Some(value) =
            EnvUtils::get_optional_parsed_var("SERVICEBUS_RETRY_MODE").map_err(env_error)?
        {
            self.retry_mode = value;
        }
        if let Some(value) = EnvUtils::get_optional_parsed_var("SERVICEBUS_RETRY_BACKOFF_FACTOR")
            .map_err(env_error)?
        {
            self.retry_backoff_factor = value;
        }
        if let Some(value) = EnvUtils::get_optional_parsed_var("SERVICEBUS_RETRY_BACKOFF_MAX")
            .map_err(env_error)?
        {
            self.retry_backoff_max = value;
        }
        if let Some(value) =
            EnvUtils::get_optional_parsed_var("SERVICEBUS_TRANSPORT_TYPE").map_err(env_error)?
        {
            self.transport_type = value;
        }
        if let Some(value) = EnvUtils::get_optional_var("SERVICEBUS_CUSTOM_ENDPOINT_ADDRESS") {
            self.custom_endpoint_address = Some(value);
        }
        if let Some(value) = EnvUtils::get_optional_var("SERVICEBUS_USER_AGENT") {
            self.user_agent = Some(value);
        }
        Ok(self)
    }
}

fn env_error(err: EnvVarError) -> ServiceBusError {
    ServiceBusError::ConfigurationError(err.to_string())
}

/// Immutable connection configuration of one handler.
///
/// Built once from [`HandlerOptions`] when the handler is constructed and
/// only read afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    hostname: String,
    transport_type: TransportType,
    retry_total: u32,
    retry_mode: RetryMode,
    retry_backoff_factor: f64,
    retry_backoff_max: f64,
    encoding: String,
    user_agent: Option<String>,
    custom_endpoint_address: Option<String>,
}

impl Configuration {
    /// # Errors
    ///
    /// Returns [`ServiceBusError::ConfigurationError`] for negative or
    /// non-finite backoff values and for an empty encoding.
    pub fn new(hostname: impl Into<String>, options: &HandlerOptions) -> ServiceBusResult<Self> {
        validate_seconds("retry_backoff_factor", options.retry_backoff_factor)?;
        validate_seconds("retry_backoff_max", options.retry_backoff_max)?;
        if options.encoding.trim().is_empty() {
            return Err(ServiceBusError::ConfigurationError(
                "encoding must not be empty".to_string(),
            ));
        }

        Ok(Self {
            hostname: hostname.into(),
            transport_type: options.transport_type,
            retry_total: options.retry_total,
            retry_mode: options.retry_mode,
            retry_backoff_factor: options.retry_backoff_factor,
            retry_backoff_max: options.retry_backoff_max,
            encoding: options.encoding.trim().to_string(),
            user_agent: options.user_agent.clone(),
            custom_endpoint_address: options.custom_endpoint_address.clone(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    pub fn retry_total(&self) -> u32 {
        self.retry_total
    }

    pub fn retry_mode(&self) -> RetryMode {
        self.retry_mode
    }

    pub fn retry_backoff_factor(&self) -> f64 {
        self.retry_backoff_factor
    }

    pub fn retry_backoff_max(&self) -> f64 {
        self.retry_backoff_max
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn custom_endpoint_address(&self) -> Option<&str> {
        self.custom_endpoint_address.as_deref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_total: self.retry_total,
            mode: self.retry_mode,
            backoff_factor: self.retry_backoff_factor,
            backoff_max: self.retry_backoff_max,
        }
    }

    /// Encodes an address with the configured encoding.
    ///
    /// Only UTF-8 is supported by the AMQP transports.
    pub fn encode(&self, value: &str) -> ServiceBusResult<Vec<u8>> {
        match self.encoding.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(value.as_bytes().to_vec()),
            other => Err(ServiceBusError::ConfigurationError(format!(
                "unsupported encoding '{other}'"
            ))),
        }
    }
}

fn validate_seconds(name: &str, value: f64) -> ServiceBusResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ServiceBusError::ConfigurationError(format!(
            "{name} must be a non-negative number of seconds, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = HandlerOptions::default();
        assert_eq!(options.retry_total, 3);
        assert_eq!(options.retry_mode, RetryMode::Exponential);
        assert_eq!(options.retry_backoff_factor, 0.8);
        assert_eq!(options.retry_backoff_max, 120.0);
        assert_eq!(options.encoding, "UTF-8");
    }

    #[test]
    fn test_partial_document_deserializes_with_defaults() {
        let options: HandlerOptions =
            serde_json::from_str(r#"{"retry_total": 0, "transport_type": "amqp_over_websocket"}"#)
                .unwrap();
        assert_eq!(options.retry_total, 0);
        assert_eq!(options.transport_type, TransportType::AmqpOverWebsocket);
        assert_eq!(options.retry_backoff_max, 120.0);
    }

    #[test]
    fn test_configuration_rejects_negative_backoff() {
        let options = HandlerOptions {
            retry_backoff_factor: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            Configuration::new("ns.servicebus.windows.net", &options),
            Err(ServiceBusError::ConfigurationError(_))
        ));

        let options = HandlerOptions {
            retry_backoff_max: f64::NAN,
            ..Default::default()
        };
        assert!(Configuration::new("ns.servicebus.windows.net", &options).is_err());
    }

    #[test]
    fn test_encode_supports_utf8_only() {
        let config =
            Configuration::new("ns.servicebus.windows.net", &HandlerOptions::default()).unwrap();
        assert_eq!(config.encode("q/$management").unwrap(), b"q/$management".to_vec());

        let options = HandlerOptions {
            encoding: "latin-1".to_string(),
            ..Default::default()
        };
        let config = Configuration::new("ns.servicebus.windows.net", &options).unwrap();
        assert!(config.encode("q").is_err());
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("Fixed".parse::<RetryMode>(), Ok(RetryMode::Fixed));
        assert_eq!(
            "AmqpOverWebsocket".parse::<TransportType>(),
            Ok(TransportType::AmqpOverWebsocket)
        );
        assert!("linear".parse::<RetryMode>().is_err());
    }
}
