//! Credential normalization.
//!
//! Handlers accept any of the credential shapes below and talk to all of
//! them through a single capability: [`ServiceBusCredential::get_token`].

use super::sas_token_generator::{SasTokenGenerator, parse_sas_expiry};
use crate::common::constants::{TOKEN_TYPE_JWT, TOKEN_TYPE_SASTOKEN};
use crate::handler::{ServiceBusError, ServiceBusResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use zeroize::Zeroizing;

/// A token value with its absolute expiry in epoch seconds.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: i64,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Token type presented to the CBS node alongside the token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    SasToken,
    Jwt,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::SasToken => TOKEN_TYPE_SASTOKEN,
            TokenType::Jwt => TOKEN_TYPE_JWT,
        }
    }
}

/// Externally issued token source, typically an Azure AD credential.
///
/// # Examples
///
/// ```no_run
/// use servicebus::auth::{AccessToken, TokenCredential};
/// use servicebus::handler::ServiceBusResult;
/// use async_trait::async_trait;
///
/// struct StaticToken;
///
/// #[async_trait]
/// impl TokenCredential for StaticToken {
///     async fn get_token(&self, _scopes: &[&str]) -> ServiceBusResult<AccessToken> {
///         Ok(AccessToken { token: "eyJ0...".to_string(), expires_on: 1_900_000_000 })
///     }
/// }
/// ```
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scopes: &[&str]) -> ServiceBusResult<AccessToken>;
}

/// Pre-issued shared access token, returned as-is.
#[derive(Clone)]
pub struct SharedAccessTokenCredential {
    token: Zeroizing<String>,
    expiry: i64,
}

impl SharedAccessTokenCredential {
    pub fn new(token: impl Into<String>, expiry: i64) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            expiry,
        }
    }

    pub fn get_token(&self) -> AccessToken {
        AccessToken {
            token: self.token.as_str().to_string(),
            expires_on: self.expiry,
        }
    }
}

/// Shared access policy name and key; signs a fresh SAS token per request.
#[derive(Clone)]
pub struct SharedKeyCredential {
    policy: String,
    key: Zeroizing<String>,
    generator: SasTokenGenerator,
}

impl SharedKeyCredential {
    pub fn new(policy: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            key: Zeroizing::new(key.into()),
            generator: SasTokenGenerator::new(),
        }
    }

    pub fn with_generator(mut self, generator: SasTokenGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn get_token(&self, scopes: &[&str]) -> ServiceBusResult<AccessToken> {
        let audience = first_scope(scopes)?;
        self.generator
            .generate_sas_token(audience, &self.policy, &self.key)
    }
}

struct NamedKey {
    name: String,
    key: Zeroizing<String>,
}

/// Rotatable name/key pair. Clones share the same underlying key, so an
/// `update` is seen by every handler holding the credential.
#[derive(Clone)]
pub struct NamedKeyCredential {
    inner: Arc<RwLock<NamedKey>>,
    generator: SasTokenGenerator,
}

impl NamedKeyCredential {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(NamedKey {
                name: name.into(),
                key: Zeroizing::new(key.into()),
            })),
            generator: SasTokenGenerator::new(),
        }
    }

    pub fn update(&self, name: impl Into<String>, key: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.name = name.into();
        guard.key = Zeroizing::new(key.into());
    }

    pub fn name(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
    }

    pub fn get_token(&self, scopes: &[&str]) -> ServiceBusResult<AccessToken> {
        let audience = first_scope(scopes)?;
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        self.generator
            .generate_sas_token(audience, &guard.name, &guard.key)
    }
}

/// Rotatable, already signed SAS signature.
#[derive(Clone)]
pub struct SasCredential {
    signature: Arc<RwLock<Zeroizing<String>>>,
}

impl SasCredential {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: Arc::new(RwLock::new(Zeroizing::new(signature.into()))),
        }
    }

    pub fn update(&self, signature: impl Into<String>) {
        let mut guard = self
            .signature
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Zeroizing::new(signature.into());
    }

    /// Returns the signature with the expiry parsed from its `se=` field.
    pub fn get_token(&self) -> ServiceBusResult<AccessToken> {
        let guard = self
            .signature
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let expires_on = parse_sas_expiry(&guard).ok_or_else(|| {
            ServiceBusError::InvalidArgument(
                "SAS signature does not contain an 'se' expiry field.".to_string(),
            )
        })?;
        Ok(AccessToken {
            token: guard.as_str().to_string(),
            expires_on,
        })
    }
}

fn first_scope<'a>(scopes: &[&'a str]) -> ServiceBusResult<&'a str> {
    scopes
        .first()
        .copied()
        .ok_or_else(|| ServiceBusError::InvalidArgument("No token scope provided.".to_string()))
}

/// Any credential a handler can authenticate with.
///
/// # Examples
///
/// ```no_run
/// use servicebus::auth::{NamedKeyCredential, ServiceBusCredential};
///
/// let credential: ServiceBusCredential =
///     NamedKeyCredential::new("RootManageSharedAccessKey", "key").into();
/// let token = credential
///     .get_token(&["sb://contoso.servicebus.windows.net/orders"])
///     .await?;
/// ```
#[derive(Clone)]
pub enum ServiceBusCredential {
    SharedAccessToken(SharedAccessTokenCredential),
    SharedKey(SharedKeyCredential),
    NamedKey(NamedKeyCredential),
    Sas(SasCredential),
    External(Arc<dyn TokenCredential>),
}

impl ServiceBusCredential {
    pub fn from_token_credential(credential: Arc<dyn TokenCredential>) -> Self {
        ServiceBusCredential::External(credential)
    }

    /// Fetches a token for the first of `scopes`.
    ///
    /// # Errors
    ///
    /// Key based variants fail with [`ServiceBusError::InvalidArgument`] when
    /// `scopes` is empty; a SAS signature without expiry fails the same way.
    pub async fn get_token(&self, scopes: &[&str]) -> ServiceBusResult<AccessToken> {
        match self {
            ServiceBusCredential::SharedAccessToken(credential) => Ok(credential.get_token()),
            ServiceBusCredential::SharedKey(credential) => credential.get_token(scopes),
            ServiceBusCredential::NamedKey(credential) => credential.get_token(scopes),
            ServiceBusCredential::Sas(credential) => credential.get_token(),
            ServiceBusCredential::External(credential) => credential.get_token(scopes).await,
        }
    }

    pub fn token_type(&self) -> TokenType {
        match self {
            ServiceBusCredential::External(_) => TokenType::Jwt,
            _ => TokenType::SasToken,
        }
    }
}

impl fmt::Debug for ServiceBusCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self {
            ServiceBusCredential::SharedAccessToken(_) => "SharedAccessToken",
            ServiceBusCredential::SharedKey(_) => "SharedKey",
            ServiceBusCredential::NamedKey(_) => "NamedKey",
            ServiceBusCredential::Sas(_) => "Sas",
            ServiceBusCredential::External(_) => "External",
        };
        f.debug_tuple("ServiceBusCredential")
            .field(&variant)
            .finish()
    }
}

impl From<SharedAccessTokenCredential> for ServiceBusCredential {
    fn from(credential: SharedAccessTokenCredential) -> Self {
        ServiceBusCredential::SharedAccessToken(credential)
    }
}

impl From<SharedKeyCredential> for ServiceBusCredential {
    fn from(credential: SharedKeyCredential) -> Self {
        ServiceBusCredential::SharedKey(credential)
    }
}

impl From<NamedKeyCredential> for ServiceBusCredential {
    fn from(credential: NamedKeyCredential) -> Self {
        ServiceBusCredential::NamedKey(credential)
    }
}

impl From<SasCredential> for ServiceBusCredential {
    fn from(credential: SasCredential) -> Self {
        ServiceBusCredential::Sas(credential)
    }
}

impl From<Arc<dyn TokenCredential>> for ServiceBusCredential {
    fn from(credential: Arc<dyn TokenCredential>) -> Self {
        ServiceBusCredential::External(credential)
    }
}
