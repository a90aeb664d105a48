//! Configuration for the Quill runtime.
//!
//! Configuration is layered with figment (defaults, files, environment,
//! programmatic overrides) and validated before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ChannelConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, QuillConfig,
    RegistrantsConfig, SpanEventConfig,
};
pub use validation::validate_config;
