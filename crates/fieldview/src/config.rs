//! Server configuration
//!
//! Layered with figment, each layer overriding the previous one:
//! built-in defaults, an optional TOML file, `FIELDVIEW_<SECTION>__<KEY>`
//! environment variables, then command-line overrides.
//!
//! ```toml
//! [server]
//! port = 9700
//!
//! [engine]
//! memory_limit = 268435456
//! preludes = ["scripts/site.js"]
//!
//! [presentation]
//! color_map = "CoolToWarm"
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use fieldview_script::{BridgeOptions, BridgeResult};
use serde::{Deserialize, Serialize};

use crate::presentation::{ColorMap, DisplayOptions, ScalarBarRange, ViewMode};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "FIELDVIEW_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldviewConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub presentation: PresentationDefaults,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9700,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the interpreter thread
    pub name: String,
    pub queue_depth: usize,
    /// Interpreter heap limit in bytes
    pub memory_limit: Option<usize>,
    /// Provide the built-in headless render engine
    pub headless: bool,
    /// Scripts evaluated at startup, in order
    pub preludes: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let options = BridgeOptions::default();
        Self {
            name: options.name,
            queue_depth: options.queue_depth,
            memory_limit: options.memory_limit,
            headless: options.headless,
            preludes: Vec::new(),
        }
    }
}

/// Display options applied to presentations created without explicit ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationDefaults {
    pub view_mode: ViewMode,
    pub color_map: ColorMap,
    pub scalar_bar_range: ScalarBarRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fieldview=info,tower_http=debug".to_string(),
            json: false,
        }
    }
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl FieldviewConfig {
    /// Load defaults, `path` (skipped if it does not exist), the environment
    /// and `overrides`.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self, figment::Error> {
        Self::figment(path, overrides).extract()
    }

    pub fn figment(path: &Path, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(FieldviewConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        if let Some(host) = &overrides.host {
            figment = figment.merge(Serialized::default("server.host", host));
        }
        if let Some(port) = overrides.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }
        figment
    }

    /// Bridge options for this configuration. Reads the prelude files.
    pub fn bridge_options(&self) -> BridgeResult<BridgeOptions> {
        BridgeOptions {
            name: self.engine.name.clone(),
            queue_depth: self.engine.queue_depth,
            memory_limit: self.engine.memory_limit,
            headless: self.engine.headless,
            preludes: Vec::new(),
        }
        .with_prelude_files(&self.engine.preludes)
    }

    pub fn display_defaults(&self) -> DisplayOptions {
        DisplayOptions {
            view_mode: self.presentation.view_mode,
            color_map: self.presentation.color_map,
            scalar_bar_range: self.presentation.scalar_bar_range,
            ..DisplayOptions::default()
        }
    }

    /// The effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
