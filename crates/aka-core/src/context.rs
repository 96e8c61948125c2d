//! Application context
//!
//! Built once after plugins have registered their commands, then shared by
//! reference with every handler and completion provider. Nothing in it is
//! mutated after construction.

use crate::config::Settings;
use crate::error::Result;
use crate::http::ApiClient;
use crate::plugin::PluginRecord;
use crate::registry::CommandRegistry;

pub struct AppContext {
    settings: Settings,
    api: ApiClient,
    registry: CommandRegistry,
    plugins: Vec<PluginRecord>,
}

impl AppContext {
    pub fn new(settings: Settings, registry: CommandRegistry) -> Result<Self> {
        let api = ApiClient::new(&settings)?;
        Ok(Self {
            settings,
            api,
            registry,
            plugins: Vec::new(),
        })
    }

    /// Attach the records of successfully loaded plugins
    pub fn with_plugins(mut self, plugins: Vec<PluginRecord>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn plugins(&self) -> &[PluginRecord] {
        &self.plugins
    }
}
