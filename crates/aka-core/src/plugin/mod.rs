//! Plugin Module
//!
//! Plugins contribute commands to the registry at startup.
//!
//! - `source`: where plugins come from (`PluginSource`, compiled-in `StaticSource`)
//! - `external`: user-installed plugins run as subprocesses (`ExecutableSource`)
//! - `loader`: per-plugin isolated `init` / `update` passes

mod external;
mod loader;
mod source;

pub use external::{ExecutableSource, ExternalPlugin, ManifestCommand, ManifestOption, PluginManifest};
pub use loader::{LoadReport, PluginFailure, PluginLoader};
pub use source::{is_skipped, PluginSource, StaticSource};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::CommandRegistry;

/// Descriptive metadata of a plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Command group the plugin owns (e.g. `builds`)
    pub group: String,
    /// One-line help shown in listings
    pub help: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Whether the group belongs in the primary help section
    #[serde(default)]
    pub primary: bool,
}

/// A unit contributing commands to the registry
pub trait Plugin: Send + Sync {
    fn info(&self) -> PluginInfo;

    /// Register commands; called once per process
    fn init(&self, registry: &mut CommandRegistry) -> Result<()>;

    /// Whether `update` does anything for this plugin
    fn supports_update(&self) -> bool {
        false
    }

    fn update(&self, _registry: &CommandRegistry) -> Result<()> {
        Ok(())
    }
}

/// A plugin that loaded and initialized successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRecord {
    /// Entry name within its source
    pub name: String,
    /// Label of the source it came from (`bundled`, `user`)
    pub source: String,
    pub info: PluginInfo,
}
