pub mod complete;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod plugin;
pub mod registry;
pub mod tail;

pub use complete::{complete, search, Candidate, CandidateStyle, CompletionInput};
pub use config::{default_base_dir, Config, Settings};
pub use context::AppContext;
pub use error::{AkaError, Result};
pub use http::{ApiClient, HttpClient, HttpError, NetrcStore, Response};
pub use plugin::{
    ExecutableSource, LoadReport, Plugin, PluginFailure, PluginInfo, PluginLoader, PluginRecord,
    PluginSource, StaticSource,
};
pub use registry::{
    CommandArgs, CommandDescriptor, CommandHandler, CommandRegistry, CompletionProvider,
    CompletionRequest, Invocation, OptionKind, OptionSpec, Positional, Visibility,
};
pub use tail::{LogTailer, TailOutcome};
