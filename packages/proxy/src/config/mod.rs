//! Configuration for the server and its connections
//!
//! All settings are plain structs with `Default` values and consuming `with_*`
//! builder methods. A `Server` validates its configuration once at construction
//! and never changes it afterwards.

pub mod connect;
pub mod server;
pub mod validation;

pub use connect::ConnectConfig;
pub use server::{OverloadPolicy, ServerConfig, DEFAULT_PORT};
pub use validation::{ConfigResult, ConfigValidator, ConfigurationError, Validator};
