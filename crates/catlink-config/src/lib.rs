//! YAML configuration loading for the CatLink bridge
//!
//! The loader understands the custom tags used in Home Assistant style
//! configuration directories:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! The `catlink:` section is parsed into [`CatlinkYaml`], a list of
//! declared accounts plus device overrides.
//!
//! # Example
//!
//! ```ignore
//! use catlink_config::{load_yaml, CatlinkYaml};
//!
//! let root = load_yaml("/config", "configuration.yaml")?;
//! let section = CatlinkYaml::from_root(&root)?;
//! ```

mod error;
mod loader;
mod schema;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use schema::{CatlinkYaml, YamlAccount};
pub use secrets::Secrets;

pub use serde_yaml::Value;
