//! Helpers shared by the handler and the credential adapter.
//!
//! - [`env`] - validated environment variable access for configuration
//! - [`strip_protocol_from_uri`] - namespace normalisation
//! - [`create_properties`] - user-agent properties sent when a link opens

pub mod env;

pub use env::{EnvUtils, EnvVarError};

use std::collections::BTreeMap;

/// Connection properties announced to the service when a link is opened.
pub type ConnectionProperties = BTreeMap<String, String>;

const USER_AGENT_PREFIX: &str = "azsdk-rust-servicebus";

/// Removes a leading `scheme://` from `uri`, if any.
///
/// Users often paste `sb://` or `https://` namespaces; the handler only
/// wants the host part.
pub fn strip_protocol_from_uri(uri: &str) -> &str {
    match uri.find("//") {
        Some(pos) => &uri[pos + 2..],
        None => uri,
    }
}

/// Builds the user-agent properties for a handler.
///
/// A caller supplied `user_agent` is prepended to the generated agent string.
pub fn create_properties(user_agent: Option<&str>) -> ConnectionProperties {
    let version = env!("CARGO_PKG_VERSION");
    let platform = format!("{}; {}", std::env::consts::OS, std::env::consts::ARCH);

    let mut agent = format!("{USER_AGENT_PREFIX}/{version} ({platform})");
    if let Some(prefix) = user_agent.map(str::trim).filter(|p| !p.is_empty()) {
        agent = format!("{prefix} {agent}");
    }

    let mut properties = ConnectionProperties::new();
    properties.insert("product".to_string(), USER_AGENT_PREFIX.to_string());
    properties.insert("version".to_string(), version.to_string());
    properties.insert("framework".to_string(), "Rust".to_string());
    properties.insert("platform".to_string(), platform);
    properties.insert("user-agent".to_string(), agent);
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_protocol_from_uri() {
        assert_eq!(
            strip_protocol_from_uri("sb://contoso.servicebus.windows.net/"),
            "contoso.servicebus.windows.net/"
        );
        assert_eq!(
            strip_protocol_from_uri("https://contoso.servicebus.windows.net"),
            "contoso.servicebus.windows.net"
        );
        assert_eq!(
            strip_protocol_from_uri("contoso.servicebus.windows.net"),
            "contoso.servicebus.windows.net"
        );
    }

    #[test]
    fn test_create_properties_prepends_custom_agent() {
        let properties = create_properties(Some("orders-service/2.1"));
        let agent = &properties["user-agent"];
        assert!(agent.starts_with("orders-service/2.1 azsdk-rust-servicebus/"));
        assert_eq!(properties["product"], "azsdk-rust-servicebus");
        assert_eq!(properties["framework"], "Rust");
    }

    #[test]
    fn test_create_properties_ignores_blank_agent() {
        let properties = create_properties(Some("   "));
        assert!(properties["user-agent"].starts_with("azsdk-rust-servicebus/"));
    }
}
