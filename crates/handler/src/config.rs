use std::path::PathBuf;

use ion_core::DEFAULT_BASE_DIR;
use tracing::warn;

pub const BASE_DIR_ENV: &str = "ION_BASE_DIR";
pub const SIDECAR_PORT_ENV: &str = "SIDECAR_PORT";
pub const DEBUG_ENV: &str = "MODULE_DEBUG";

pub const DEFAULT_SIDECAR_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Root of the sandbox tree
    pub base_dir: PathBuf,
    /// Port of the sidecar's control surface on localhost
    pub sidecar_port: u16,
    pub debug: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            sidecar_port: DEFAULT_SIDECAR_PORT,
            debug: false,
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for unset or
    /// unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup(BASE_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.base_dir = PathBuf::from(dir);
        }

        if let Some(port) = lookup(SIDECAR_PORT_ENV) {
            match port.trim().parse::<u16>() {
                Ok(port) => config.sidecar_port = port,
                Err(e) => warn!(value = %port, error = %e, "ignoring invalid {SIDECAR_PORT_ENV}"),
            }
        }

        config.debug = lookup(DEBUG_ENV).is_some_and(|v| v.eq_ignore_ascii_case("true"));
        config
    }
}
