//! Plugins shipped inside the binary, and the roots scanned at startup

pub mod builds;

use aka_core::{ExecutableSource, PluginSource, Settings, StaticSource};

pub const BUNDLED: &str = "bundled";
pub const USER: &str = "user";

pub fn bundled() -> StaticSource {
    StaticSource::new(BUNDLED).with_plugin("builds", builds::BuildsPlugin)
}

/// Plugin roots in load order: bundled first, then user-installed
pub fn sources(settings: &Settings) -> Vec<Box<dyn PluginSource>> {
    vec![
        Box::new(bundled()),
        Box::new(ExecutableSource::new(USER, settings.plugins_dir.clone())),
    ]
}
