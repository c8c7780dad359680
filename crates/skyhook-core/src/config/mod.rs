//! Configuration for the platform endpoints and push behaviour
//!
//! Settings live in a single `skyhook.toml`, by default under the per-user
//! config directory. Command-line flags override individual values.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_skyhook_toml, parse_skyhook_toml_str, to_toml};
pub use paths::{CONFIG_FILE_NAME, config_path_in, default_config_dir};
pub use schema::SkyhookConfig;
pub use store::ConfigStore;
