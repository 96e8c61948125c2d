//! Commands owned by the client itself

use async_trait::async_trait;
use colored::Colorize;

use aka_core::{
    AkaError, AppContext, CommandArgs, CommandDescriptor, CommandHandler, CommandRegistry, Config,
    OptionSpec, PluginLoader, Result,
};

use crate::plugins;
use crate::shell;

const SQUIRREL: &str = r#"
                              _
                          .-'` `}
                  _./)   /       }
                .'o   \ |       }
                '.___.'`.\    {`
                /`\_/  , `.    }
                \=' .-'   _`\  {
                 `'`;/      `,  }
                    _\       ;  }
                   /__`;-...'--'

                   SQUIRREL!
"#;

pub fn register(registry: &mut CommandRegistry) -> Result<()> {
    registry
        .register(CommandDescriptor::listed(
            "update",
            "update the akkeris client plugins",
            Update,
        ))?
        .register(CommandDescriptor::listed("version", "display version", Version))?
        .register(CommandDescriptor::hidden("squirrel", Squirrel))?
        .register(
            CommandDescriptor::listed("autocomplete", "adds the shell autocompletion.", Autocomplete)
                .option(OptionSpec::string("shell", "bash or zsh (default: from $SHELL)")),
        )?
        .register(CommandDescriptor::listed(
            "config [KEY] [VALUE]",
            "list, get or set client configuration",
            ConfigCommand,
        ))?
        .register(CommandDescriptor::listed(
            "config:path",
            "print the configuration file location",
            ConfigPath,
        ))?;
    Ok(())
}

/// Version banner and installed plugins
pub fn version_text(ctx: &AppContext) -> String {
    let mut out = format!(
        "akkeris/{} {}-{}\n",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        std::env::consts::OS
    );
    out.push_str("\n=== Installed Plugins\n");
    for plugin in ctx.plugins() {
        match &plugin.info.version {
            Some(version) => out.push_str(&format!("{} @{}\n", plugin.info.group, version)),
            None => out.push_str(&format!("{}\n", plugin.info.group)),
        }
    }
    out
}

struct Version;

#[async_trait]
impl CommandHandler for Version {
    async fn run(&self, ctx: &AppContext, _args: &CommandArgs) -> Result<()> {
        print!("{}", version_text(ctx));
        Ok(())
    }
}

struct Update;

#[async_trait]
impl CommandHandler for Update {
    async fn run(&self, ctx: &AppContext, _args: &CommandArgs) -> Result<()> {
        for source in plugins::sources(ctx.settings()) {
            let report = PluginLoader::update(source.as_ref(), ctx.registry());
            for record in &report.loaded {
                println!("{} {}", "Checked:".green(), record.info.group);
            }
            for failure in &report.failures {
                eprintln!(
                    "{} error updating plugin \"{}\": {}",
                    "[WARN]".yellow().bold(),
                    failure.plugin,
                    failure.error
                );
            }
        }
        Ok(())
    }
}

struct Squirrel;

#[async_trait]
impl CommandHandler for Squirrel {
    async fn run(&self, _ctx: &AppContext, _args: &CommandArgs) -> Result<()> {
        println!("{SQUIRREL}");
        Ok(())
    }
}

struct Autocomplete;

#[async_trait]
impl CommandHandler for Autocomplete {
    async fn run(&self, _ctx: &AppContext, args: &CommandArgs) -> Result<()> {
        let shell = shell::resolve_shell(args.value("shell"))?;
        let home = dirs::home_dir().ok_or(AkaError::HomeNotFound)?;

        match shell::install_hook(shell, &home, "aka")? {
            Some(path) => println!(
                "{} {} (takes effect with the next shell)",
                "Installed:".green(),
                path.display()
            ),
            None => println!("Autocomplete is already installed for {shell}."),
        }
        Ok(())
    }
}

struct ConfigCommand;

#[async_trait]
impl CommandHandler for ConfigCommand {
    async fn run(&self, ctx: &AppContext, args: &CommandArgs) -> Result<()> {
        let base_dir = &ctx.settings().base_dir;
        let mut config = Config::load(base_dir)?;

        match (args.positional("KEY"), args.positional("VALUE")) {
            (None, _) => {
                for (key, value) in config.list() {
                    println!("{} = {}", key.cyan(), value);
                }
            }
            (Some(key), None) => {
                let value = config.get(key).ok_or_else(|| AkaError::ConfigKeyNotFound {
                    key: key.to_string(),
                })?;
                println!("{value}");
            }
            (Some(key), Some(value)) => {
                config.set(key, value)?;
                config.save(base_dir)?;
                println!("{} {} = {}", "Set:".green(), key, value);
            }
        }
        Ok(())
    }
}

struct ConfigPath;

#[async_trait]
impl CommandHandler for ConfigPath {
    async fn run(&self, ctx: &AppContext, _args: &CommandArgs) -> Result<()> {
        println!("{}", Config::path(&ctx.settings().base_dir).display());
        Ok(())
    }
}
