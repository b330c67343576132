pub mod constants;
pub mod errors;

pub use errors::{AmqpError, AmqpErrorKind};
