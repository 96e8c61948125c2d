//! Command descriptors
//!
//! A descriptor is the registered shape of one command. The pattern text
//! (`"builds:info [ID]"`) is parsed once here into an explicit name and an
//! ordered list of positional slots.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::Result;
use crate::registry::args::CommandArgs;

/// Runs a dispatched command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: &AppContext, args: &CommandArgs) -> Result<()>;
}

/// What a dynamic completion provider is asked for
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Dispatch key of the matched command
    pub command: &'a str,
    /// Placeholder name of the slot being completed (e.g. `ID`)
    pub slot: &'a str,
    /// Last argument typed before the current token
    pub previous: Option<&'a str>,
}

/// Produces candidate values for a positional slot
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, ctx: &AppContext, request: CompletionRequest<'_>)
        -> Result<Vec<String>>;
}

/// Value type of a command option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    #[default]
    String,
    Boolean,
}

/// One entry of a command's options schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: String,
    pub alias: Option<char>,
    pub kind: OptionKind,
    pub required: bool,
    pub default: Option<String>,
    pub description: String,
}

impl OptionSpec {
    /// Create a string-valued option
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            kind: OptionKind::String,
            required: false,
            default: None,
            description: description.into(),
        }
    }

    /// Create a boolean flag
    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: OptionKind::Boolean,
            ..Self::string(name, description)
        }
    }

    pub fn alias(mut self, alias: char) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A positional placeholder of a command pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Positional {
    pub name: String,
    pub required: bool,
    /// The token exactly as written in the pattern
    pub token: String,
}

impl Positional {
    fn parse(token: &str) -> Self {
        let (name, required) =
            if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                (inner, false)
            } else if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                (inner, true)
            } else {
                (token, true)
            };
        Self {
            name: name.to_string(),
            required,
            token: token.to_string(),
        }
    }

    /// Placeholder as written in usage text
    pub fn placeholder(&self) -> String {
        if self.required {
            format!("<{}>", self.name)
        } else {
            format!("[{}]", self.name)
        }
    }
}

/// Whether a command shows up in help and autocomplete listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Listed(String),
    Hidden,
}

/// Registered shape of one command
#[derive(Clone)]
pub struct CommandDescriptor {
    pub(crate) name: String,
    pub(crate) pattern: String,
    pub(crate) positionals: Vec<Positional>,
    pub(crate) visibility: Visibility,
    pub(crate) options: Vec<OptionSpec>,
    pub(crate) aliases: Vec<String>,
    pub(crate) handler: Arc<dyn CommandHandler>,
    pub(crate) completion: Option<Arc<dyn CompletionProvider>>,
}

impl CommandDescriptor {
    /// Create a command listed in help and autocomplete
    pub fn listed(
        pattern: &str,
        description: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        Self::build(pattern, Visibility::Listed(description.into()), Arc::new(handler))
    }

    /// Create a command that is dispatchable but never listed
    pub fn hidden(pattern: &str, handler: impl CommandHandler + 'static) -> Self {
        Self::build(pattern, Visibility::Hidden, Arc::new(handler))
    }

    /// Create a command sharing an existing handler
    pub fn with_handler(
        pattern: &str,
        visibility: Visibility,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self::build(pattern, visibility, handler)
    }

    fn build(pattern: &str, visibility: Visibility, handler: Arc<dyn CommandHandler>) -> Self {
        let pattern = pattern.replace('\\', "");
        let mut tokens = pattern.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_lowercase();
        let positionals = tokens.map(Positional::parse).collect();

        Self {
            name,
            pattern: pattern.trim().to_string(),
            positionals,
            visibility,
            options: Vec::new(),
            aliases: Vec::new(),
            handler,
            completion: None,
        }
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = OptionSpec>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    pub fn completion(mut self, provider: impl CompletionProvider + 'static) -> Self {
        self.completion = Some(Arc::new(provider));
        self
    }

    pub fn shared_completion(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    /// Dispatch key: the lower-cased first token of the pattern
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn positionals(&self) -> &[Positional] {
        &self.positionals
    }

    pub fn option_specs(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn description(&self) -> Option<&str> {
        match &self.visibility {
            Visibility::Listed(description) => Some(description),
            Visibility::Hidden => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility == Visibility::Hidden
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    pub fn completion_provider(&self) -> Option<&Arc<dyn CompletionProvider>> {
        self.completion.as_ref()
    }

    /// Usage line built from the structured slots
    pub fn usage(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.positionals.iter().map(Positional::placeholder));
        parts.join(" ")
    }

    pub(crate) fn matches_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.name == name || self.aliases.iter().any(|alias| *alias == name)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("positionals", &self.positionals)
            .field("visibility", &self.visibility)
            .field("options", &self.options)
            .field("aliases", &self.aliases)
            .field("completion", &self.completion.is_some())
            .finish()
    }
}
