//! Autocomplete engine
//!
//! Resolves a partial shell input into candidate next tokens using only the
//! registry: command names first, then positional slots or options of the
//! command already typed.
//!
//! Completion is best-effort. Every failure path ends in an empty candidate
//! list; nothing here may surface an error to the invoking shell.

use tracing::debug;

use crate::context::AppContext;
use crate::registry::{
    CommandDescriptor, CommandRegistry, CompletionRequest, OptionKind, OptionSpec,
};

/// Marker ending option parsing; completing it asks for the options list
const END_OF_OPTIONS: &str = "--";

/// A completion candidate offered to the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub description: Option<String>,
}

impl Candidate {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    pub fn described(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: Some(description.into()),
        }
    }

    /// Render for the invoking shell
    pub fn render(&self, style: CandidateStyle) -> String {
        match style {
            CandidateStyle::Plain => self.value.clone(),
            CandidateStyle::Described => {
                let value = self.value.replace(':', "\\:");
                match &self.description {
                    Some(description) => format!("{value}:{description}"),
                    None => value,
                }
            }
        }
    }
}

/// How candidates are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStyle {
    /// One bare value per line (bash)
    Plain,
    /// `value:description` with colons in the value escaped (zsh `_describe`)
    Described,
}

/// Shell input being completed
///
/// `words` are the shell words as passed after the completion flag: the
/// program name first and the word under the cursor last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionInput {
    current: String,
    typed: Vec<String>,
}

impl CompletionInput {
    pub fn from_words(words: &[String]) -> Self {
        match words.split_last() {
            Some((current, typed)) => Self {
                current: current.clone(),
                typed: typed.to_vec(),
            },
            None => Self {
                current: String::new(),
                typed: Vec::new(),
            },
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Words already typed before the current one, program name included
    pub fn typed(&self) -> &[String] {
        &self.typed
    }

    fn subcommand(&self) -> Option<&str> {
        self.typed
            .get(1)
            .map(String::as_str)
            .filter(|word| !word.is_empty())
    }
}

/// Produce candidates for the given input
///
/// A typed subcommand is matched against hidden commands too, so their
/// slots and options complete; hidden commands are never offered as names.
pub async fn complete(ctx: &AppContext, input: &CompletionInput) -> Vec<Candidate> {
    let registry = ctx.registry();

    if input.subcommand().is_some() || input.current() == END_OF_OPTIONS {
        let matched = input
            .subcommand()
            .and_then(|name| registry.with_key(name).next());
        if let Some(command) = matched {
            return complete_command(ctx, command, input).await;
        }
    }

    search(registry, input.current())
        .into_iter()
        .filter_map(|command| {
            command
                .description()
                .map(|description| Candidate::described(command.name(), description))
        })
        .collect()
}

/// Listed commands matching `token`
///
/// Case-insensitive prefix match on the dispatch key; only when that finds
/// nothing, a substring match.
pub fn search<'a>(registry: &'a CommandRegistry, token: &str) -> Vec<&'a CommandDescriptor> {
    let token = token.to_lowercase();

    let prefixed: Vec<_> = registry
        .visible()
        .filter(|c| c.name().starts_with(&token))
        .collect();
    if !prefixed.is_empty() {
        return prefixed;
    }

    registry
        .visible()
        .filter(|c| c.name().contains(&token))
        .collect()
}

async fn complete_command(
    ctx: &AppContext,
    command: &CommandDescriptor,
    input: &CompletionInput,
) -> Vec<Candidate> {
    let typed = positional_words(command, input.typed());
    let slot = command.positionals().len() as isize - typed.len() as isize;

    if slot <= 0 {
        return command.option_specs().iter().map(option_candidate).collect();
    }

    let index = command.positionals().len() - slot as usize;
    let positional = &command.positionals()[index];

    let Some(provider) = command.completion_provider() else {
        return vec![Candidate::plain(positional.token.clone())];
    };

    let request = CompletionRequest {
        command: command.name(),
        slot: &positional.name,
        previous: typed.last().copied(),
    };
    match provider.complete(ctx, request).await {
        Ok(values) => values.into_iter().map(Candidate::plain).collect(),
        Err(err) => {
            debug!(command = command.name(), error = %err, "completion provider failed");
            Vec::new()
        }
    }
}

fn option_candidate(option: &OptionSpec) -> Candidate {
    Candidate::described(format!("--{}", option.name), option.description.clone())
}

/// Non-empty positional words typed after the command name
///
/// Flags are skipped, along with the value word of a string option.
fn positional_words<'a>(command: &CommandDescriptor, typed: &'a [String]) -> Vec<&'a str> {
    let mut words = Vec::new();
    let mut rest = typed.iter().skip(2).map(String::as_str);
    let mut options_ended = false;

    while let Some(word) = rest.next() {
        if word.is_empty() {
            continue;
        }
        if options_ended || !word.starts_with('-') || word == "-" {
            words.push(word);
            continue;
        }
        if word == END_OF_OPTIONS {
            options_ended = true;
            continue;
        }
        if takes_value(command, word) {
            rest.next();
        }
    }

    words
}

fn takes_value(command: &CommandDescriptor, flag: &str) -> bool {
    if flag.contains('=') {
        return false;
    }
    let option = match flag.strip_prefix("--") {
        Some(long) => command.option_specs().iter().find(|o| o.name == long),
        None => {
            let mut chars = flag[1..].chars();
            match (chars.next(), chars.next()) {
                (Some(short), None) => command
                    .option_specs()
                    .iter()
                    .find(|o| o.alias == Some(short)),
                _ => None,
            }
        }
    };
    option.is_some_and(|o| o.kind == OptionKind::String)
}
