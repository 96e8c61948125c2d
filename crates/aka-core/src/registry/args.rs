//! Argument parsing for a dispatched command
//!
//! A `clap::Command` is generated from the descriptor's structured slots, so
//! required options and positionals are checked before any handler runs.

use std::collections::HashMap;

use clap::error::ErrorKind;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

use crate::error::{AkaError, Result};
use crate::registry::descriptor::{CommandDescriptor, OptionKind};

/// Parsed arguments handed to a command handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    command: String,
    positionals: Vec<(String, Option<String>)>,
    values: HashMap<String, String>,
    flags: HashMap<String, bool>,
    raw: Vec<String>,
}

impl CommandArgs {
    /// Dispatch key of the command these arguments were parsed for
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Value of a positional slot, if it was given
    pub fn positional(&self, name: &str) -> Option<&str> {
        self.positionals
            .iter()
            .find(|(slot, _)| slot == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Value of a string option (explicit or default)
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Value of a string option that must be non-empty
    pub fn require(&self, name: &str) -> Result<&str> {
        match self.value(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(AkaError::user_input(format!(
                "Missing required argument: --{name}"
            ))),
        }
    }

    /// Arguments after the command name, exactly as typed
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn with_positional(mut self, name: &str, value: Option<&str>) -> Self {
        self.positionals
            .push((name.to_string(), value.map(str::to_string)));
        self
    }

    pub fn with_value(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_flag(mut self, name: &str, value: bool) -> Self {
        self.flags.insert(name.to_string(), value);
        self
    }
}

/// Outcome of parsing a command line against a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(CommandArgs),
    /// `--help` was requested; carries the rendered help text
    Help(String),
}

impl CommandDescriptor {
    /// Build the clap command for this descriptor
    pub fn to_clap(&self) -> Command {
        let mut cmd = Command::new(self.name.clone())
            .disable_version_flag(true)
            .override_usage(self.usage());

        if let Some(description) = self.description() {
            cmd = cmd.about(description.to_string());
        }

        for (index, slot) in self.positionals.iter().enumerate() {
            cmd = cmd.arg(
                Arg::new(slot.name.clone())
                    .index(index + 1)
                    .required(slot.required)
                    .value_name(slot.name.clone()),
            );
        }

        for option in &self.options {
            let mut arg = Arg::new(option.name.clone())
                .long(option.name.clone())
                .help(option.description.clone());
            if let Some(alias) = option.alias {
                arg = arg.short(alias);
            }
            arg = match option.kind {
                OptionKind::String => {
                    let arg = arg.action(ArgAction::Set).required(option.required);
                    match &option.default {
                        Some(default) => arg.default_value(default.clone()),
                        None => arg,
                    }
                }
                OptionKind::Boolean => arg
                    .action(ArgAction::Set)
                    .num_args(0..=1)
                    .value_parser(value_parser!(bool))
                    .default_missing_value("true")
                    .default_value(option.default.clone().unwrap_or_else(|| "false".into())),
            };
            cmd = cmd.arg(arg);
        }

        cmd
    }

    /// Parse the arguments that followed the command name
    pub fn parse_args(&self, args: &[String]) -> Result<Invocation> {
        let argv = std::iter::once(self.name.clone()).chain(args.iter().cloned());
        let matches = match self.to_clap().try_get_matches_from(argv) {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return Ok(Invocation::Help(err.render().to_string()));
            }
            Err(err) => {
                return Err(AkaError::user_input(err.render().to_string().trim_end()));
            }
        };

        Ok(Invocation::Run(self.collect(&matches, args)))
    }

    fn collect(&self, matches: &ArgMatches, raw: &[String]) -> CommandArgs {
        let mut parsed = CommandArgs {
            command: self.name.clone(),
            raw: raw.to_vec(),
            ..CommandArgs::default()
        };

        for slot in &self.positionals {
            let value = matches.get_one::<String>(&slot.name).cloned();
            parsed.positionals.push((slot.name.clone(), value));
        }

        for option in &self.options {
            match option.kind {
                OptionKind::String => {
                    if let Some(value) = matches.get_one::<String>(&option.name) {
                        parsed.values.insert(option.name.clone(), value.clone());
                    }
                }
                OptionKind::Boolean => {
                    let value = matches.get_one::<bool>(&option.name).copied().unwrap_or(false);
                    parsed.flags.insert(option.name.clone(), value);
                }
            }
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::descriptor::tests::Noop;
    use crate::registry::descriptor::OptionSpec;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn output_command() -> CommandDescriptor {
        CommandDescriptor::listed("builds:output [ID]", "view output", Noop)
            .option(
                OptionSpec::string("app", "The app to act on.")
                    .alias('a')
                    .required(),
            )
            .option(OptionSpec::boolean("tail", "Follow output").alias('t'))
    }

    #[test]
    fn test_parse_fills_positionals_left_to_right() {
        let cmd = output_command();
        let invocation = cmd
            .parse_args(&args(&["latest", "--app", "api", "-t"]))
            .unwrap();

        let Invocation::Run(parsed) = invocation else {
            panic!("expected a run invocation");
        };
        assert_eq!(parsed.positional("ID"), Some("latest"));
        assert_eq!(parsed.value("app"), Some("api"));
        assert!(parsed.flag("tail"));
        assert_eq!(parsed.raw(), &args(&["latest", "--app", "api", "-t"])[..]);
    }

    #[test]
    fn test_missing_required_option_is_user_error() {
        let cmd = output_command();
        let err = cmd.parse_args(&args(&["latest"])).unwrap_err();

        assert!(matches!(err, AkaError::UserInput(_)));
        assert!(err.to_string().contains("--app"));
    }

    #[test]
    fn test_optional_positional_may_be_absent() {
        let cmd = output_command();
        let Invocation::Run(parsed) = cmd.parse_args(&args(&["-a", "api"])).unwrap() else {
            panic!("expected a run invocation");
        };
        assert_eq!(parsed.positional("ID"), None);
        assert!(!parsed.flag("tail"));
    }

    #[test]
    fn test_boolean_default_true_can_be_disabled() {
        let cmd = CommandDescriptor::listed("builds:auto", "auto", Noop).option(
            OptionSpec::boolean("status_check", "Wait for checks").default_value("true"),
        );

        let Invocation::Run(parsed) = cmd.parse_args(&[]).unwrap() else {
            panic!("expected a run invocation");
        };
        assert!(parsed.flag("status_check"));

        let Invocation::Run(parsed) = cmd
            .parse_args(&args(&["--status_check", "false"]))
            .unwrap()
        else {
            panic!("expected a run invocation");
        };
        assert!(!parsed.flag("status_check"));
    }

    #[test]
    fn test_help_is_rendered_not_run() {
        let cmd = output_command();
        let invocation = cmd.parse_args(&args(&["--help"])).unwrap();

        let Invocation::Help(text) = invocation else {
            panic!("expected help");
        };
        assert!(text.contains("view output"));
        assert!(text.contains("--app"));
    }

    #[test]
    fn test_require_rejects_blank_values() {
        let parsed = CommandArgs::default().with_value("app", "  ");
        assert!(matches!(
            parsed.require("app"),
            Err(AkaError::UserInput(_))
        ));
        assert!(matches!(
            CommandArgs::default().require("app"),
            Err(AkaError::UserInput(_))
        ));
    }
}
