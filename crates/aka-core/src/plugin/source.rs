use crate::error::{AkaError, Result};
use crate::plugin::Plugin;

/// Prefixes of entries that are never loaded
const HIDDEN_PREFIX: &str = ".";
const TEMP_PREFIX: &str = "tmp";

/// A root that plugins are discovered in and loaded from
pub trait PluginSource {
    /// Short name used in logs and records
    fn label(&self) -> &str;

    /// Entry names available in this source, in any order
    fn entries(&self) -> Result<Vec<String>>;

    /// Load one entry
    fn load(&self, name: &str) -> Result<Box<dyn Plugin>>;
}

/// Hidden and temporary entries are skipped
pub fn is_skipped(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX) || name.starts_with(TEMP_PREFIX)
}

type Constructor = Box<dyn Fn() -> Result<Box<dyn Plugin>> + Send + Sync>;

/// Plugins compiled into the binary
pub struct StaticSource {
    label: String,
    plugins: Vec<(String, Constructor)>,
}

impl StaticSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            plugins: Vec::new(),
        }
    }

    /// Add a plugin built by `constructor`
    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.plugins.push((name.into(), Box::new(constructor)));
        self
    }

    /// Add a plugin value that is cheap to clone
    pub fn with_plugin<P>(self, name: impl Into<String>, plugin: P) -> Self
    where
        P: Plugin + Clone + 'static,
    {
        self.with(name, move || Ok(Box::new(plugin.clone()) as Box<dyn Plugin>))
    }
}

impl PluginSource for StaticSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn entries(&self) -> Result<Vec<String>> {
        Ok(self.plugins.iter().map(|(name, _)| name.clone()).collect())
    }

    fn load(&self, name: &str) -> Result<Box<dyn Plugin>> {
        let (_, constructor) = self
            .plugins
            .iter()
            .find(|(entry, _)| entry == name)
            .ok_or_else(|| AkaError::PluginLoad {
                plugin: name.to_string(),
                message: format!("not part of the {} plugins", self.label),
            })?;
        constructor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_skipped() {
        assert!(is_skipped(".git"));
        assert!(is_skipped(".DS_Store"));
        assert!(is_skipped("tmp-install"));
        assert!(is_skipped("tmp"));
        assert!(!is_skipped("builds"));
        assert!(!is_skipped("apps-tmp"));
    }

    #[test]
    fn test_static_source_unknown_entry() {
        let source = StaticSource::new("bundled");
        assert!(source.entries().unwrap().is_empty());
        assert!(matches!(
            source.load("ghost"),
            Err(AkaError::PluginLoad { .. })
        ));
    }
}
