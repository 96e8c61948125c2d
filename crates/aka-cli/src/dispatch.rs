//! Routing of the command line to a registered command

use aka_core::{AkaError, AppContext, CommandRegistry, Invocation, Result};

const USAGE: &str = "Usage: aka COMMAND [--app APP] [command-specific-options]";

/// Run the command selected by `args`
pub async fn dispatch(ctx: &AppContext, args: &[String]) -> Result<()> {
    let Some((name, rest)) = args.split_first() else {
        print!("{}", render_help(ctx.registry()));
        return Err(AkaError::user_input("Please specify a command."));
    };

    let name = match name.as_str() {
        "--help" | "-h" => {
            print!("{}", render_help(ctx.registry()));
            return Ok(());
        }
        "--version" | "-v" => "version",
        other => other,
    };

    let command = ctx
        .registry()
        .find(name)
        .ok_or_else(|| AkaError::UnknownCommand {
            name: name.to_string(),
            suggestions: ctx.registry().suggest(name),
        })?;

    match command.parse_args(rest)? {
        Invocation::Help(text) => {
            print!("{text}");
            Ok(())
        }
        Invocation::Run(parsed) => command.handler().run(ctx, &parsed).await,
    }
}

/// Listed commands grouped by topic (the part of the key before the first `:`)
pub fn render_help(registry: &CommandRegistry) -> String {
    let mut topics: Vec<(&str, Vec<(String, &str)>)> = Vec::new();
    for command in registry.visible() {
        let topic = command.name().split(':').next().unwrap_or_default();
        let entry = (command.usage(), command.description().unwrap_or_default());
        match topics.iter_mut().find(|(t, _)| *t == topic) {
            Some((_, entries)) => entries.push(entry),
            None => topics.push((topic, vec![entry])),
        }
    }

    let width = topics
        .iter()
        .flat_map(|(_, entries)| entries.iter().map(|(usage, _)| usage.len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{USAGE}\n");
    for (topic, entries) in &topics {
        out.push_str(&format!("\n{topic}\n"));
        for (usage, description) in entries {
            out.push_str(&format!("  {usage:<width$}  {description}\n"));
        }
    }
    out
}
