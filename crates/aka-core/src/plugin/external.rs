//! User-installed plugins
//!
//! Each directory under the plugin root holds a `plugin.toml` manifest and
//! an executable. Commands declared in the manifest are registered like any
//! other; running one spawns the executable:
//!
//! ```text
//! <exe> <command> [args...]                 run a command
//! <exe> --complete <command> <slot> [prev]  print candidates, one per line
//! <exe> --update                            post-install / upgrade hook
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::context::AppContext;
use crate::error::{AkaError, Result};
use crate::plugin::source::PluginSource;
use crate::plugin::{Plugin, PluginInfo};
use crate::registry::{
    CommandArgs, CommandDescriptor, CommandHandler, CommandRegistry, CompletionProvider,
    CompletionRequest, OptionKind, OptionSpec, Visibility,
};

pub const MANIFEST_FILE: &str = "plugin.toml";

/// Contents of `plugin.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(flatten)]
    pub info: PluginInfo,
    /// Path of the executable, relative to the plugin directory
    pub executable: PathBuf,
    /// Whether the executable understands `--update`
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub commands: Vec<ManifestCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCommand {
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Whether the executable answers `--complete` for this command
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub options: Vec<ManifestOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestOption {
    pub name: String,
    #[serde(default)]
    pub alias: Option<char>,
    #[serde(default, rename = "type")]
    pub kind: OptionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl From<&ManifestOption> for OptionSpec {
    fn from(option: &ManifestOption) -> Self {
        OptionSpec {
            name: option.name.clone(),
            alias: option.alias,
            kind: option.kind,
            required: option.required,
            default: option.default.clone(),
            description: option.description.clone(),
        }
    }
}

impl PluginManifest {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|e| AkaError::PluginManifest {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| AkaError::PluginManifest {
            path,
            message: e.message().to_string(),
        })
    }
}

// ============================================================================
// Source
// ============================================================================

/// Plugins installed as directories under one root
#[derive(Debug, Clone)]
pub struct ExecutableSource {
    label: String,
    root: PathBuf,
}

impl ExecutableSource {
    pub fn new(label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PluginSource for ExecutableSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn entries(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            debug!(root = %self.root.display(), "plugin directory does not exist");
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<Box<dyn Plugin>> {
        let plugin = ExternalPlugin::open(self.root.join(name))?;
        Ok(Box::new(plugin))
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// A plugin backed by an executable
#[derive(Debug, Clone)]
pub struct ExternalPlugin {
    dir: PathBuf,
    executable: PathBuf,
    manifest: PluginManifest,
}

impl ExternalPlugin {
    /// Read the manifest in `dir` and locate its executable
    pub fn open(dir: PathBuf) -> Result<Self> {
        let manifest = PluginManifest::load(&dir)?;
        let executable = dir.join(&manifest.executable);
        if !executable.is_file() {
            return Err(AkaError::PluginManifest {
                path: dir.join(MANIFEST_FILE),
                message: format!("executable not found: {}", executable.display()),
            });
        }

        Ok(Self {
            dir,
            executable,
            manifest,
        })
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn runner(&self) -> Arc<Runner> {
        Arc::new(Runner {
            dir: self.dir.clone(),
            executable: self.executable.clone(),
        })
    }
}

impl Plugin for ExternalPlugin {
    fn info(&self) -> PluginInfo {
        self.manifest.info.clone()
    }

    fn init(&self, registry: &mut CommandRegistry) -> Result<()> {
        let runner = self.runner();

        for declared in &self.manifest.commands {
            let visibility = if declared.hidden {
                Visibility::Hidden
            } else {
                Visibility::Listed(declared.description.clone())
            };

            let mut command =
                CommandDescriptor::with_handler(&declared.pattern, visibility, runner.clone())
                    .options(declared.options.iter().map(OptionSpec::from));
            for alias in &declared.aliases {
                command = command.alias(alias);
            }
            if declared.complete {
                command = command.shared_completion(runner.clone());
            }

            registry.register(command)?;
        }

        Ok(())
    }

    fn supports_update(&self) -> bool {
        self.manifest.update
    }

    fn update(&self, _registry: &CommandRegistry) -> Result<()> {
        let status = std::process::Command::new(&self.executable)
            .arg("--update")
            .current_dir(&self.dir)
            .env(PLUGIN_DIR_ENV, &self.dir)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(AkaError::PluginCommand {
                command: "--update".to_string(),
                code: status.code(),
            })
        }
    }
}

// ============================================================================
// Subprocess handler
// ============================================================================

const PLUGIN_DIR_ENV: &str = "AKA_PLUGIN_DIR";
const API_HOST_ENV: &str = "AKKERIS_API_HOST";

/// Spawns the plugin executable for commands and completions
#[derive(Debug)]
struct Runner {
    dir: PathBuf,
    executable: PathBuf,
}

impl Runner {
    fn command(&self, ctx: &AppContext) -> Command {
        let mut command = Command::new(&self.executable);
        command.current_dir(&self.dir).env(PLUGIN_DIR_ENV, &self.dir);
        if let Some(host) = &ctx.settings().api_host {
            command.env(API_HOST_ENV, host);
        }
        command
    }
}

#[async_trait]
impl CommandHandler for Runner {
    async fn run(&self, ctx: &AppContext, args: &CommandArgs) -> Result<()> {
        let name = args.command().to_string();
        debug!(executable = %self.executable.display(), command = %name, "running plugin command");

        let status = self
            .command(ctx)
            .arg(&name)
            .args(args.raw())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(AkaError::PluginCommand {
                command: name,
                code: status.code(),
            })
        }
    }
}

#[async_trait]
impl CompletionProvider for Runner {
    async fn complete(
        &self,
        ctx: &AppContext,
        request: CompletionRequest<'_>,
    ) -> Result<Vec<String>> {
        let mut command = self.command(ctx);
        command
            .arg("--complete")
            .arg(request.command)
            .arg(request.slot);
        if let Some(previous) = request.previous {
            command.arg(previous);
        }

        let output = command.output().await?;
        if !output.status.success() {
            warn!(command = request.command, "plugin completion failed");
            return Err(AkaError::PluginCommand {
                command: request.command.to_string(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
