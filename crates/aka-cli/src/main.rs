use std::error::Error;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use aka_core::{
    complete, default_base_dir, AkaError, AppContext, CommandRegistry, CompletionInput, Config,
    LoadReport, PluginFailure, PluginLoader, Result, Settings,
};

mod args;
mod builtin;
mod dispatch;
mod plugins;
mod shell;

use args::{Cli, COMPLETION_FLAG};

const LOG_ENV: &str = "AKA_LOG";
const HOME_ENV: &str = "AKA_HOME";
const DEBUG_ENV: &str = "DEBUG";
const GENERIC_ERROR: &str = "An unexpected error occurred. Run with --debug for details.";

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    // Completion mode: candidates on stdout only, exit 0 no matter what
    if let Some(position) = argv.iter().position(|arg| arg == COMPLETION_FLAG) {
        run_completion(&argv[..position], &argv[position + 1..]);
        return ExitCode::SUCCESS;
    }

    init_tracing();

    let cli = Cli::parse_from(&argv);
    let debug = cli.debug || std::env::var_os(DEBUG_ENV).is_some_and(|v| !v.is_empty());
    install_panic_hook(debug);

    match guarded(|| run(cli)) {
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(e)) => {
            report_error(&e, debug);
            ExitCode::from(e.exit_code().clamp(1, 255) as u8)
        }
        // The panic hook has already reported it
        None => ExitCode::FAILURE,
    }
}

/// Run `f`, turning a panic into `None`
fn guarded<T>(f: impl FnOnce() -> T) -> Option<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).ok()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn install_panic_hook(debug: bool) {
    panic::set_hook(Box::new(move |info| {
        eprintln!("{} {}", "[ERROR]".red().bold(), GENERIC_ERROR);
        if debug {
            eprintln!("{info}");
        }
    }));
}

fn report_error(err: &AkaError, debug: bool) {
    let mut lines = error_lines(err, debug).into_iter();
    if let Some(message) = lines.next() {
        eprintln!("{} {}", "[ERROR]".red().bold(), message);
    }
    for cause in lines {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }
}

/// The message to show, followed by the cause chain when debugging
fn error_lines(err: &AkaError, debug: bool) -> Vec<String> {
    if !debug {
        let message = if err.is_user_facing() {
            err.to_string()
        } else {
            GENERIC_ERROR.to_string()
        };
        return vec![message];
    }

    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(cause.to_string());
        source = cause.source();
    }
    lines
}

fn run(cli: Cli) -> Result<()> {
    let base_dir = resolve_base_dir(cli.base_dir)?;
    let config = Config::load(&base_dir)?;
    let mut settings = Settings::from_env(&config, &base_dir);
    settings.debug |= cli.debug;

    prepare_base_dir(&settings);

    let (registry, report) = build_registry(&settings)?;
    for failure in &report.failures {
        eprintln!("{} {}", "[WARN]".yellow().bold(), describe_failure(failure));
    }
    debug!(
        commands = registry.len(),
        plugins = report.loaded.len(),
        "registry ready"
    );

    let ctx = AppContext::new(settings, registry)?.with_plugins(report.loaded);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch::dispatch(&ctx, &cli.args))
}

/// Create the base and plugin directories and a commented `config.toml`
fn prepare_base_dir(settings: &Settings) {
    if let Err(e) = settings.ensure_dirs() {
        warn!(error = %e, "could not create the akkeris directories");
        return;
    }
    if let Err(e) = Config::init(&settings.base_dir) {
        warn!(error = %e, "could not write the default config");
    }
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(base) = cli_base {
        return Ok(base);
    }

    match std::env::var(HOME_ENV) {
        Ok(base) if !base.is_empty() => Ok(PathBuf::from(base)),
        _ => default_base_dir(),
    }
}

/// Built-in commands, then bundled plugins, then user-installed plugins
fn build_registry(settings: &Settings) -> Result<(CommandRegistry, LoadReport)> {
    let mut registry = CommandRegistry::new();
    builtin::register(&mut registry)?;

    let mut report = LoadReport::default();
    for source in plugins::sources(settings) {
        report.merge(PluginLoader::load(source.as_ref(), &mut registry));
    }
    Ok((registry, report))
}

fn describe_failure(failure: &PluginFailure) -> String {
    match failure.error {
        AkaError::PluginLoad { .. } => failure.error.to_string(),
        _ => format!(
            "Error loading plugin \"{}\": {}",
            failure.plugin, failure.error
        ),
    }
}

// ============================================================================
// Completion mode
// ============================================================================

fn run_completion(head: &[String], words: &[String]) {
    panic::set_hook(Box::new(|_| {}));

    if let Some(Some(lines)) = guarded(|| completion_candidates(head, words)) {
        let mut stdout = io::stdout().lock();
        for line in lines {
            if writeln!(stdout, "{line}").is_err() {
                break;
            }
        }
    }
}

fn completion_candidates(head: &[String], words: &[String]) -> Option<Vec<String>> {
    let cli_base = Cli::try_parse_from(head).ok().and_then(|cli| cli.base_dir);
    let base_dir = resolve_base_dir(cli_base).ok()?;
    let config = Config::load(&base_dir).unwrap_or_default();
    let settings = Settings::from_env(&config, &base_dir);

    let (registry, _) = build_registry(&settings).ok()?;
    let ctx = AppContext::new(settings, registry).ok()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .ok()?;

    let candidates = runtime.block_on(complete(&ctx, &CompletionInput::from_words(words)));
    let style = shell::candidate_style(shell::completion_shell());
    Some(candidates.iter().map(|c| c.render(style)).collect())
}
