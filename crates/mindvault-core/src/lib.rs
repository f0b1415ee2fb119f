pub mod errors;
pub mod types;

pub use errors::{DiscoveryError, SessionError};
pub use types::*;
