pub mod connection_string;
pub mod credential;
pub mod sas_token_generator;

pub use connection_string::ConnectionStringProperties;
pub use credential::{
    AccessToken, NamedKeyCredential, SasCredential, ServiceBusCredential,
    SharedAccessTokenCredential, SharedKeyCredential, TokenCredential, TokenType,
};
pub use sas_token_generator::{SasTokenGenerator, parse_sas_expiry};
