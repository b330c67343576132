use super::credential::{ServiceBusCredential, SharedAccessTokenCredential, SharedKeyCredential};
use super::sas_token_generator::parse_sas_expiry;
use crate::handler::{ServiceBusError, ServiceBusResult};
use crate::utils::strip_protocol_from_uri;
use std::fmt;
use zeroize::Zeroizing;

/// Components of a Service Bus connection string.
///
/// # Connection String Format
///
/// ```text
/// Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<policy>;SharedAccessKey=<key>[;EntityPath=<entity>]
/// Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessSignature=<signature>[;EntityPath=<entity>]
/// ```
///
/// Keys are matched case-insensitively and unknown keys are ignored.
#[derive(Clone)]
pub struct ConnectionStringProperties {
    endpoint: String,
    fully_qualified_namespace: String,
    shared_access_key_name: Option<String>,
    shared_access_key: Option<Zeroizing<String>>,
    shared_access_signature: Option<Zeroizing<String>>,
    entity_path: Option<String>,
}

impl ConnectionStringProperties {
    pub fn parse(conn_str: &str) -> ServiceBusResult<Self> {
        let malformed = || {
            ServiceBusError::InvalidArgument(
                "Connection string is either blank or malformed.".to_string(),
            )
        };

        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut signature = None;
        let mut entity_path = None;

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (name, value) = part.split_once('=').ok_or_else(malformed)?;
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(Zeroizing::new(value)),
                "sharedaccesssignature" => signature = Some(Zeroizing::new(value)),
                "entitypath" => entity_path = Some(value),
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(malformed)?;
        if !endpoint.contains("://") {
            return Err(ServiceBusError::InvalidArgument(
                "Invalid Endpoint on the Connection String.".to_string(),
            ));
        }
        let fully_qualified_namespace = strip_protocol_from_uri(&endpoint)
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if fully_qualified_namespace.is_empty() {
            return Err(ServiceBusError::InvalidArgument(
                "Invalid Endpoint on the Connection String.".to_string(),
            ));
        }

        let has_key = key_name.is_some() || key.is_some();
        match (has_key, signature.is_some()) {
            (true, true) => {
                return Err(ServiceBusError::InvalidArgument(
                    "Only one of the SharedAccessKeyName or SharedAccessSignature must be present."
                        .to_string(),
                ));
            }
            (false, false) => {
                return Err(ServiceBusError::InvalidArgument(
                    "At least one of the SharedAccessKeyName or SharedAccessSignature must be present."
                        .to_string(),
                ));
            }
            (true, false) if key_name.is_none() || key.is_none() => {
                return Err(ServiceBusError::InvalidArgument(
                    "Connection string must have both SharedAccessKeyName and SharedAccessKey."
                        .to_string(),
                ));
            }
            _ => {}
        }

        Ok(Self {
            endpoint,
            fully_qualified_namespace,
            shared_access_key_name: key_name,
            shared_access_key: key,
            shared_access_signature: signature,
            entity_path: entity_path.filter(|path| !path.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn fully_qualified_namespace(&self) -> &str {
        &self.fully_qualified_namespace
    }

    pub fn shared_access_key_name(&self) -> Option<&str> {
        self.shared_access_key_name.as_deref()
    }

    pub fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }

    /// Builds the credential described by the connection string.
    ///
    /// A `SharedAccessSignature` becomes a pre-issued token whose expiry is
    /// read from its `se=` field; a key pair becomes a shared key credential.
    pub fn credential(&self) -> ServiceBusResult<ServiceBusCredential> {
        if let Some(signature) = &self.shared_access_signature {
            let expiry = parse_sas_expiry(signature).ok_or_else(|| {
                ServiceBusError::InvalidArgument(
                    "Connection string is either blank or malformed.".to_string(),
                )
            })?;
            return Ok(SharedAccessTokenCredential::new(signature.as_str(), expiry).into());
        }

        match (&self.shared_access_key_name, &self.shared_access_key) {
            (Some(name), Some(key)) => {
                Ok(SharedKeyCredential::new(name.as_str(), key.as_str()).into())
            }
            _ => Err(ServiceBusError::InvalidArgument(
                "Connection string must have both SharedAccessKeyName and SharedAccessKey."
                    .to_string(),
            )),
        }
    }
}

impl fmt::Debug for ConnectionStringProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStringProperties")
            .field("endpoint", &self.endpoint)
            .field("fully_qualified_namespace", &self.fully_qualified_namespace)
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field("entity_path", &self.entity_path)
            .finish_non_exhaustive()
    }
}
