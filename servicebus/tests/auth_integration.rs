use async_trait::async_trait;
use chrono::Utc;
use claims::{assert_err, assert_matches, assert_ok};
use servicebus::auth::{
    AccessToken, ConnectionStringProperties, NamedKeyCredential, SasCredential, SasTokenGenerator,
    ServiceBusCredential, SharedAccessTokenCredential, SharedKeyCredential, TokenCredential,
    TokenType,
};
use servicebus::handler::{ServiceBusError, ServiceBusResult};
use std::sync::{Arc, Mutex};

const AUDIENCE: &str = "sb://contoso.servicebus.windows.net/orders";

mod connection_strings {
    use super::*;

    fn invalid_argument(conn_str: &str) -> String {
        match assert_err!(ConnectionStringProperties::parse(conn_str)) {
            ServiceBusError::InvalidArgument(message) => message,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shared_key_connection_string() {
        let properties = assert_ok!(ConnectionStringProperties::parse(
            "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=c2VjcmV0PQ==;EntityPath=orders"
        ));

        assert_eq!(properties.endpoint(), "sb://contoso.servicebus.windows.net/");
        assert_eq!(
            properties.fully_qualified_namespace(),
            "contoso.servicebus.windows.net"
        );
        assert_eq!(
            properties.shared_access_key_name(),
            Some("RootManageSharedAccessKey")
        );
        assert_eq!(properties.entity_path(), Some("orders"));
        assert_matches!(
            assert_ok!(properties.credential()),
            ServiceBusCredential::SharedKey(_)
        );
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let properties = assert_ok!(ConnectionStringProperties::parse(
            "endpoint=sb://contoso.servicebus.windows.net;sharedaccesskeyname=policy;SHAREDACCESSKEY=key;"
        ));

        assert_eq!(
            properties.fully_qualified_namespace(),
            "contoso.servicebus.windows.net"
        );
        assert_eq!(properties.shared_access_key_name(), Some("policy"));
        assert_eq!(properties.entity_path(), None);
    }

    #[tokio::test]
    async fn test_signature_connection_string_yields_token_credential() {
        let signature = "SharedAccessSignature sr=sb%3A%2F%2Fcontoso&sig=abc%3D&se=1900000000&skn=policy";
        let properties = assert_ok!(ConnectionStringProperties::parse(&format!(
            "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessSignature={signature}"
        )));

        let credential = assert_ok!(properties.credential());
        assert_matches!(credential, ServiceBusCredential::SharedAccessToken(_));

        let token = assert_ok!(credential.get_token(&[]).await);
        assert_eq!(token.token, signature);
        assert_eq!(token.expires_on, 1_900_000_000);
    }

    #[test]
    fn test_blank_connection_string() {
        assert_eq!(
            invalid_argument(""),
            "Connection string is either blank or malformed."
        );
        assert_eq!(
            invalid_argument("no key value pairs here"),
            "Connection string is either blank or malformed."
        );
    }

    #[test]
    fn test_endpoint_needs_a_scheme() {
        assert_eq!(
            invalid_argument("Endpoint=contoso.servicebus.windows.net;SharedAccessKeyName=p;SharedAccessKey=k"),
            "Invalid Endpoint on the Connection String."
        );
    }

    #[test]
    fn test_key_and_signature_are_exclusive() {
        assert_eq!(
            invalid_argument(
                "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=p;SharedAccessKey=k;SharedAccessSignature=sig"
            ),
            "Only one of the SharedAccessKeyName or SharedAccessSignature must be present."
        );
    }

    #[test]
    fn test_some_credential_is_required() {
        assert_eq!(
            invalid_argument("Endpoint=sb://contoso.servicebus.windows.net/"),
            "At least one of the SharedAccessKeyName or SharedAccessSignature must be present."
        );
    }

    #[test]
    fn test_key_name_needs_a_key() {
        assert_eq!(
            invalid_argument("Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=p"),
            "Connection string must have both SharedAccessKeyName and SharedAccessKey."
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let properties = assert_ok!(ConnectionStringProperties::parse(
            "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=policy;SharedAccessKey=super-secret-key"
        ));
        assert!(!format!("{properties:?}").contains("super-secret-key"));
    }
}

mod credentials {
    use super::*;

    struct RecordingTokenCredential {
        scopes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TokenCredential for RecordingTokenCredential {
        async fn get_token(&self, scopes: &[&str]) -> ServiceBusResult<AccessToken> {
            self.scopes
                .lock()
                .unwrap()
                .extend(scopes.iter().map(|s| s.to_string()));
            Ok(AccessToken {
                token: "eyJ0eXAiOiJKV1QifQ".to_string(),
                expires_on: 1_900_000_000,
            })
        }
    }

    #[tokio::test]
    async fn test_shared_access_token_is_returned_as_is() {
        let credential: ServiceBusCredential =
            SharedAccessTokenCredential::new("SharedAccessSignature sr=x&sig=y&se=10", 10).into();

        let token = assert_ok!(credential.get_token(&[AUDIENCE]).await);
        assert_eq!(token.token, "SharedAccessSignature sr=x&sig=y&se=10");
        assert_eq!(token.expires_on, 10);
        assert_eq!(credential.token_type(), TokenType::SasToken);
    }

    #[tokio::test]
    async fn test_shared_key_signs_first_scope() {
        let credential: ServiceBusCredential =
            SharedKeyCredential::new("RootManageSharedAccessKey", "secret").into();
        let before = Utc::now().timestamp();

        let token = assert_ok!(credential.get_token(&[AUDIENCE, "ignored"]).await);

        assert!(token.token.starts_with(
            "SharedAccessSignature sr=sb%3A%2F%2Fcontoso.servicebus.windows.net%2Forders&sig="
        ));
        assert!(token.token.ends_with("&skn=RootManageSharedAccessKey"));
        assert!(token.expires_on >= before + 3600);
        assert!(token.expires_on <= Utc::now().timestamp() + 3600);
        assert!(token.token.contains(&format!("&se={}", token.expires_on)));
    }

    #[tokio::test]
    async fn test_shared_key_requires_a_scope() {
        let credential: ServiceBusCredential = SharedKeyCredential::new("policy", "secret").into();

        let error = assert_err!(credential.get_token(&[]).await);
        match error {
            ServiceBusError::InvalidArgument(message) => {
                assert_eq!(message, "No token scope provided.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_named_key_requires_a_scope() {
        let credential: ServiceBusCredential = NamedKeyCredential::new("policy", "secret").into();
        assert_matches!(
            credential.get_token(&[]).await,
            Err(ServiceBusError::InvalidArgument(_))
        );
    }

    #[tokio::test]
    async fn test_named_key_rotation_is_picked_up() {
        let named = NamedKeyCredential::new("old-policy", "old-key");
        let credential: ServiceBusCredential = named.clone().into();

        named.update("new-policy", "new-key");

        let token = assert_ok!(credential.get_token(&[AUDIENCE]).await);
        assert!(token.token.ends_with("&skn=new-policy"));
    }

    #[tokio::test]
    async fn test_sas_credential_reads_expiry_from_signature() {
        let sas = SasCredential::new("SharedAccessSignature sr=a&sig=b&se=1800000000");
        let credential: ServiceBusCredential = sas.clone().into();

        let token = assert_ok!(credential.get_token(&[]).await);
        assert_eq!(token.expires_on, 1_800_000_000);

        sas.update("SharedAccessSignature sr=a&sig=c&se=1800003600");
        let token = assert_ok!(credential.get_token(&[]).await);
        assert_eq!(token.token, "SharedAccessSignature sr=a&sig=c&se=1800003600");
        assert_eq!(token.expires_on, 1_800_003_600);
    }

    #[tokio::test]
    async fn test_external_credential_is_delegated_to() {
        let external = Arc::new(RecordingTokenCredential {
            scopes: Mutex::new(Vec::new()),
        });
        let credential = ServiceBusCredential::from_token_credential(external.clone());

        let token = assert_ok!(credential.get_token(&[AUDIENCE]).await);

        assert_eq!(token.expires_on, 1_900_000_000);
        assert_eq!(credential.token_type(), TokenType::Jwt);
        assert_eq!(*external.scopes.lock().unwrap(), vec![AUDIENCE.to_string()]);
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let credential: ServiceBusCredential = SharedKeyCredential::new("policy", "hunter2").into();
        assert!(!format!("{credential:?}").contains("hunter2"));

        let token = AccessToken {
            token: "SharedAccessSignature sig=hunter2".to_string(),
            expires_on: 0,
        };
        assert!(!format!("{token:?}").contains("hunter2"));
    }
}

mod sas_tokens {
    use super::*;

    #[test]
    fn test_known_signature() {
        let token = assert_ok!(SasTokenGenerator::sign(
            AUDIENCE,
            "send-policy",
            "secret",
            1_700_000_000
        ));

        assert_eq!(
            token,
            "SharedAccessSignature sr=sb%3A%2F%2Fcontoso.servicebus.windows.net%2Forders&sig=O1%2FDdOL7GRXotdrucd8uyDG%2Bg1NrjsGwAsNYUplt60c%3D&se=1700000000&skn=send-policy"
        );
    }

    #[test]
    fn test_custom_ttl() {
        let generator = SasTokenGenerator::with_ttl(chrono::Duration::minutes(5));
        let before = Utc::now().timestamp();

        let token = assert_ok!(generator.generate_sas_token(AUDIENCE, "policy", "secret"));

        assert!(token.expires_on >= before + 300);
        assert!(token.expires_on <= Utc::now().timestamp() + 300);
    }
}
