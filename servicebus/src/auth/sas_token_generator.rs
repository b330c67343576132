use super::credential::AccessToken;
use crate::common::constants::DEFAULT_SAS_TOKEN_TTL_SECS;
use crate::handler::{ServiceBusError, ServiceBusResult};
use base64::{Engine as _, engine::general_purpose};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generator for Azure Service Bus Shared Access Signature (SAS) tokens.
///
/// Creates time-limited authentication tokens using HMAC-SHA256 signing with
/// shared access keys. The token is scoped to a single audience, usually the
/// `sb://{namespace}/{entity}` URI of the handler being authorized.
///
/// # Security Notes
///
/// - Generated tokens expire after the configured TTL (one hour by default)
/// - The key is used as raw UTF-8 bytes, exactly as the service expects
/// - Audience and policy name are form-encoded (space becomes `+`) in both
///   the string to sign and the final token
/// - `skn` is always present, even for an empty policy name
///
/// # Examples
///
/// ```no_run
/// use servicebus::auth::SasTokenGenerator;
///
/// let generator = SasTokenGenerator::new();
/// let token = generator.generate_sas_token(
///     "sb://my-namespace.servicebus.windows.net/orders",
///     "RootManageSharedAccessKey",
///     "shared_access_key",
/// )?;
/// ```
#[derive(Clone, Debug)]
pub struct SasTokenGenerator {
    ttl: Duration,
}

impl SasTokenGenerator {
    pub fn new() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_SAS_TOKEN_TTL_SECS),
        }
    }

    /// Creates a generator issuing tokens valid for `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Generates a SAS token for `audience`, expiring `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceBusError::InvalidArgument`] if the HMAC cannot be
    /// initialised from the key.
    pub fn generate_sas_token(
        &self,
        audience: &str,
        policy: &str,
        key: &str,
    ) -> ServiceBusResult<AccessToken> {
        let expires_on = (Utc::now() + self.ttl).timestamp();
        let token = Self::sign(audience, policy, key, expires_on)?;
        Ok(AccessToken { token, expires_on })
    }

    /// Signs `audience` for the given absolute expiry (epoch seconds).
    ///
    /// The output is a pure function of its inputs.
    pub fn sign(
        audience: &str,
        policy: &str,
        key: &str,
        expires_on: i64,
    ) -> ServiceBusResult<String> {
        let encoded_audience = quote_plus(audience);
        let string_to_sign = format!("{encoded_audience}\n{expires_on}");

        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|e| {
            ServiceBusError::InvalidArgument(format!("Failed to create HMAC: {e}"))
        })?;

        mac.update(string_to_sign.as_bytes());
        let signature = mac.finalize();
        let signature_base64 = general_purpose::STANDARD.encode(signature.into_bytes());

        Ok(format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            encoded_audience,
            urlencoding::encode(&signature_base64),
            expires_on,
            quote_plus(policy)
        ))
    }
}

impl Default for SasTokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Percent-encodes `value`, writing spaces as `+`.
fn quote_plus(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// Extracts the `se=` expiry (epoch seconds) from a SAS signature.
pub fn parse_sas_expiry(signature: &str) -> Option<i64> {
    signature
        .split(['&', ' '])
        .find_map(|item| item.strip_prefix("se="))
        .and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_layout() {
        let token = SasTokenGenerator::sign(
            "sb://contoso.servicebus.windows.net/orders",
            "send-policy",
            "secret",
            1_700_000_000,
        )
        .unwrap();

        assert!(token.starts_with(
            "SharedAccessSignature sr=sb%3A%2F%2Fcontoso.servicebus.windows.net%2Forders&sig="
        ));
        assert!(token.contains("&se=1700000000"));
        assert!(token.ends_with("&skn=send-policy"));
    }

    #[test]
    fn test_sign_is_deterministic_and_key_sensitive() {
        let a = SasTokenGenerator::sign("sb://ns/q", "p", "key-one", 42).unwrap();
        let b = SasTokenGenerator::sign("sb://ns/q", "p", "key-one", 42).unwrap();
        let c = SasTokenGenerator::sign("sb://ns/q", "p", "key-two", 42).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_policy_keeps_skn() {
        let token = SasTokenGenerator::sign("sb://ns/q", "", "key", 42).unwrap();
        assert!(token.ends_with("&se=42&skn="));
    }

    #[test]
    fn test_spaces_are_form_encoded() {
        let token = SasTokenGenerator::sign("sb://ns/my queue", "send policy", "key", 42).unwrap();
        assert!(token.starts_with("SharedAccessSignature sr=sb%3A%2F%2Fns%2Fmy+queue&sig="));
        assert!(token.ends_with("&skn=send+policy"));
    }

    #[test]
    fn test_generated_expiry_uses_ttl() {
        let generator = SasTokenGenerator::with_ttl(Duration::seconds(60));
        let before = Utc::now().timestamp();
        let token = generator
            .generate_sas_token("sb://ns/q", "policy", "key")
            .unwrap();
        assert!(token.expires_on >= before + 60);
        assert!(token.expires_on <= Utc::now().timestamp() + 60);
        assert_eq!(parse_sas_expiry(&token.token), Some(token.expires_on));
    }

    #[test]
    fn test_parse_sas_expiry() {
        assert_eq!(parse_sas_expiry("sr=a&sig=b&se=123&skn=c"), Some(123));
        assert_eq!(parse_sas_expiry("SharedAccessSignature se=9&sr=a"), Some(9));
        assert_eq!(parse_sas_expiry("sr=a&sig=b"), None);
        assert_eq!(parse_sas_expiry("se=soon"), None);
    }
}
