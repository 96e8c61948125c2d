//! Command Registry
//!
//! Ordered, append-only table of command descriptors. Plugins append to it
//! during startup; once the `AppContext` owns it nothing mutates it again.
//!
//! Order matters: lookups and the autocomplete search fallback are
//! first-match, so an earlier registration shadows a later duplicate.

mod args;
mod descriptor;

pub use args::{CommandArgs, Invocation};
pub use descriptor::{
    CommandDescriptor, CommandHandler, CompletionProvider, CompletionRequest, OptionKind,
    OptionSpec, Positional, Visibility,
};

use crate::complete;
use crate::error::{AkaError, Result};

/// Ordered table of registered commands
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor
    ///
    /// Only structurally empty patterns are rejected; duplicates are kept.
    pub fn register(&mut self, command: CommandDescriptor) -> Result<&mut Self> {
        if command.name.is_empty() || command.positionals.iter().any(|p| p.name.is_empty()) {
            return Err(AkaError::InvalidPattern {
                pattern: command.pattern,
            });
        }
        self.commands.push(command);
        Ok(self)
    }

    /// First command whose key or alias equals `name` (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&CommandDescriptor> {
        let name = name.to_lowercase();
        self.commands
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.commands.iter().find(|c| c.matches_name(&name)))
    }

    /// Commands whose dispatch key equals `key`, in registration order
    pub fn with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a CommandDescriptor> {
        let key = key.to_lowercase();
        self.commands.iter().filter(move |c| c.name == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter()
    }

    /// Commands shown in help and autocomplete listings
    pub fn visible(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter().filter(|c| !c.is_hidden())
    }

    /// Listed command names resembling `name`, for "did you mean" hints
    pub fn suggest(&self, name: &str) -> Vec<String> {
        complete::search(self, name)
            .into_iter()
            .map(|c| c.name().to_string())
            .take(5)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
