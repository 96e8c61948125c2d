//! Plugin loading
//!
//! Every entry is handled in isolation: a load error, an `init`/`update`
//! error or a panic in any of them is recorded and logged with the plugin's
//! name, and the scan moves on to the next entry.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, info, warn};

use crate::error::{AkaError, Result};
use crate::plugin::source::{is_skipped, PluginSource};
use crate::plugin::{Plugin, PluginRecord};
use crate::registry::CommandRegistry;

/// A plugin that failed to load, initialize or update
#[derive(Debug)]
pub struct PluginFailure {
    pub plugin: String,
    pub source: String,
    pub error: AkaError,
}

/// Result of one pass over a plugin source
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<PluginRecord>,
    pub failures: Vec<PluginFailure>,
}

impl LoadReport {
    /// Append another report, keeping order
    pub fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.failures.extend(other.failures);
    }
}

/// Runs the `init` and `update` passes over plugin sources
pub struct PluginLoader;

impl PluginLoader {
    /// Load every entry of `source` and let it register its commands
    pub fn load(source: &dyn PluginSource, registry: &mut CommandRegistry) -> LoadReport {
        let mut report = LoadReport::default();

        for name in Self::discover(source, &mut report) {
            let outcome = Self::load_one(source, &name).and_then(|plugin| {
                guarded(&name, || plugin.init(registry))?;
                Ok(plugin.info())
            });

            match outcome {
                Ok(plugin_info) => {
                    info!(plugin = %name, source = source.label(), "loaded plugin");
                    report.loaded.push(PluginRecord {
                        name,
                        source: source.label().to_string(),
                        info: plugin_info,
                    });
                }
                Err(error) => Self::record_failure(&mut report, source, name, error),
            }
        }

        report
    }

    /// Second pass invoking `update` on every plugin that supports it
    pub fn update(source: &dyn PluginSource, registry: &CommandRegistry) -> LoadReport {
        let mut report = LoadReport::default();

        for name in Self::discover(source, &mut report) {
            let outcome = Self::load_one(source, &name).and_then(|plugin| {
                if plugin.supports_update() {
                    guarded(&name, || plugin.update(registry))?;
                } else {
                    debug!(plugin = %name, "plugin has no update step");
                }
                Ok(plugin.info())
            });

            match outcome {
                Ok(plugin_info) => report.loaded.push(PluginRecord {
                    name,
                    source: source.label().to_string(),
                    info: plugin_info,
                }),
                Err(error) => Self::record_failure(&mut report, source, name, error),
            }
        }

        report
    }

    /// Loadable entry names, sorted ascending
    fn discover(source: &dyn PluginSource, report: &mut LoadReport) -> Vec<String> {
        let mut names = match source.entries() {
            Ok(names) => names,
            Err(error) => {
                warn!(source = source.label(), error = %error, "failed to list plugins");
                report.failures.push(PluginFailure {
                    plugin: source.label().to_string(),
                    source: source.label().to_string(),
                    error,
                });
                return Vec::new();
            }
        };
        names.retain(|name| !is_skipped(name));
        names.sort();
        names
    }

    fn load_one(source: &dyn PluginSource, name: &str) -> Result<Box<dyn Plugin>> {
        guarded(name, || source.load(name)).map_err(|error| match error {
            AkaError::PluginLoad { .. } => error,
            other => AkaError::PluginLoad {
                plugin: name.to_string(),
                message: other.to_string(),
            },
        })
    }

    fn record_failure(
        report: &mut LoadReport,
        source: &dyn PluginSource,
        name: String,
        error: AkaError,
    ) {
        warn!(plugin = %name, source = source.label(), error = %error, "plugin failed");
        report.failures.push(PluginFailure {
            plugin: name,
            source: source.label().to_string(),
            error,
        });
    }
}

/// Run `f`, turning a panic into a `PluginLoad` error
fn guarded<T>(plugin: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(AkaError::PluginLoad {
            plugin: plugin.to_string(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "plugin panicked".to_string())
}
