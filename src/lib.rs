//! meek HTTP helper library

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod proxy;
pub mod resilience;
pub mod transport;

pub use config::HelperConfig;
pub use error::HelperError;
pub use lifecycle::Shutdown;
pub use net::HelperServer;
pub use transport::{HttpTransport, ReqwestTransport};
