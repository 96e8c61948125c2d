//! Builds plugin
//!
//! Lists builds of an app, shows one build, and prints or follows its
//! output. `latest` and `current` stand for the most recent build.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Deserialize;
use tracing::debug;

use aka_core::{
    AkaError, AppContext, CommandArgs, CommandDescriptor, CommandHandler, CommandRegistry,
    CompletionProvider, CompletionRequest, LogTailer, OptionSpec, Plugin, PluginInfo, Result,
    TailOutcome, Visibility,
};

const LATEST: &str = "latest";
const CURRENT: &str = "current";
const MESSAGE_LIMIT: usize = 90;

#[derive(Debug, Clone, Deserialize)]
pub struct Build {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub source_blob: SourceBlob,
    #[serde(default)]
    pub output_stream_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceBlob {
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputStream {
    lines: Vec<String>,
}

// ============================================================================
// Plugin
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct BuildsPlugin;

impl Plugin for BuildsPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            group: "builds".to_string(),
            help: "manage builds (list, info, output)".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            primary: true,
        }
    }

    fn init(&self, registry: &mut CommandRegistry) -> Result<()> {
        let list: Arc<dyn CommandHandler> = Arc::new(ListBuilds);
        let info: Arc<dyn CommandHandler> = Arc::new(BuildInfo);
        let output: Arc<dyn CommandHandler> = Arc::new(BuildOutput);
        let latest: Arc<dyn CompletionProvider> = Arc::new(LatestBuild);

        let listed = |description: &str| Visibility::Listed(description.to_string());

        registry
            .register(
                CommandDescriptor::with_handler("builds", listed("list available builds"), list.clone())
                    .option(app_option()),
            )?
            .register(
                CommandDescriptor::with_handler(
                    "builds:info [ID]",
                    listed("view build info, ID can be \"latest\" for latest build."),
                    info.clone(),
                )
                .option(app_option())
                .shared_completion(latest.clone()),
            )?
            .register(
                CommandDescriptor::with_handler(
                    "builds:output [ID]",
                    listed("view output for a build, ID can be \"latest\" for latest build."),
                    output.clone(),
                )
                .options([app_option(), tail_option()])
                .shared_completion(latest.clone()),
            )?;

        registry.register(
            CommandDescriptor::with_handler("build", Visibility::Hidden, list).option(app_option()),
        )?;
        registry.register(
            CommandDescriptor::with_handler("build:info [ID]", Visibility::Hidden, info)
                .option(app_option())
                .shared_completion(latest.clone()),
        )?;
        for pattern in [
            "builds:logs [ID]",
            "builds:log [ID]",
            "build:output [ID]",
            "build:out [ID]",
            "build:logs [ID]",
            "build:log [ID]",
        ] {
            registry.register(
                CommandDescriptor::with_handler(pattern, Visibility::Hidden, output.clone())
                    .options([app_option(), tail_option()])
                    .shared_completion(latest.clone()),
            )?;
        }

        Ok(())
    }
}

fn app_option() -> OptionSpec {
    OptionSpec::string("app", "The app to act on.")
        .alias('a')
        .required()
}

fn tail_option() -> OptionSpec {
    OptionSpec::boolean("tail", "Continuously print out logs from build")
        .alias('t')
        .default_value("false")
}

// ============================================================================
// API
// ============================================================================

pub async fn list_builds(ctx: &AppContext, app: &str) -> Result<Vec<Build>> {
    ctx.api().get(&format!("/apps/{app}/builds")).await
}

pub async fn get_build(ctx: &AppContext, app: &str, id: &str) -> Result<Build> {
    ctx.api().get(&format!("/apps/{app}/builds/{id}")).await
}

/// Resolve `latest`/`current` (or nothing) to the id of the most recent build
pub async fn resolve_build_id(ctx: &AppContext, app: &str, id: Option<&str>) -> Result<String> {
    let id = id.map(str::trim).filter(|id| !id.is_empty()).unwrap_or(LATEST);
    if !id.eq_ignore_ascii_case(LATEST) && !id.eq_ignore_ascii_case(CURRENT) {
        return Ok(id.to_string());
    }

    let builds = list_builds(ctx, app).await?;
    builds
        .last()
        .map(|build| build.id.clone())
        .ok_or_else(|| AkaError::NotFound("No builds were found.".to_string()))
}

/// Full output of a build so far
pub async fn fetch_output(ctx: &AppContext, app: &str, id: &str) -> Result<String> {
    let build = get_build(ctx, app, id).await?;
    let url = build
        .output_stream_url
        .ok_or_else(|| AkaError::NotFound(format!("Build {id} has no output.")))?;
    let stream: OutputStream = ctx.api().get(&url).await?;
    Ok(stream.lines.join("\n"))
}

/// Print new output lines until the build finishes
pub async fn follow_output<S>(ctx: &AppContext, app: &str, id: &str, emit: S) -> Result<TailOutcome>
where
    S: FnMut(&str),
{
    LogTailer::new(ctx.settings().tail_interval)
        .tail(move || fetch_output(ctx, app, id), emit)
        .await
}

// ============================================================================
// Formatting
// ============================================================================

pub fn format_build(build: &Build) -> String {
    let status = if build.status == "succeeded" {
        build.status.green().to_string()
    } else {
        build.status.red().to_string()
    };

    let blob = &build.source_blob;
    let commit = blob
        .commit
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("{} -", c.chars().take(7).collect::<String>()));
    let who = blob.author.as_deref().or(blob.version.as_deref());
    let message = blob
        .message
        .as_deref()
        .map(|m| m.chars().take(MESSAGE_LIMIT).collect::<String>().replace('\n', " "));

    let version = [commit, who.map(str::to_string), message]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "{}\n  {} {}\n  {} {}\n  {} {}\n",
        format!("• Build Id: {}", build.id).bold(),
        "Created:".dimmed(),
        format_created(build.created_at.as_deref()),
        "Status:".dimmed(),
        status,
        "Version:".dimmed(),
        version
    )
}

fn format_created(created_at: Option<&str>) -> String {
    match created_at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => "unknown".to_string(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

struct ListBuilds;

#[async_trait]
impl CommandHandler for ListBuilds {
    async fn run(&self, ctx: &AppContext, args: &CommandArgs) -> Result<()> {
        let app = args.require("app")?;
        let builds = list_builds(ctx, app).await?;

        if builds.is_empty() {
            println!("No builds were found.");
        }
        for build in &builds {
            println!("{}", format_build(build));
        }
        Ok(())
    }
}

struct BuildInfo;

#[async_trait]
impl CommandHandler for BuildInfo {
    async fn run(&self, ctx: &AppContext, args: &CommandArgs) -> Result<()> {
        let app = args.require("app")?;
        let id = resolve_build_id(ctx, app, args.positional("ID")).await?;
        let build = get_build(ctx, app, &id).await?;
        println!("{}", format_build(&build));
        Ok(())
    }
}

struct BuildOutput;

#[async_trait]
impl CommandHandler for BuildOutput {
    async fn run(&self, ctx: &AppContext, args: &CommandArgs) -> Result<()> {
        let app = args.require("app")?;
        let id = resolve_build_id(ctx, app, args.positional("ID")).await?;

        if args.flag("tail") {
            let outcome = follow_output(ctx, app, &id, |line| println!("{line}")).await?;
            debug!(build = %id, marker = %outcome.marker, polls = outcome.polls, "build output finished");
        } else {
            println!("{}", fetch_output(ctx, app, &id).await?);
        }
        Ok(())
    }
}

/// Offers `latest` for build id slots
struct LatestBuild;

#[async_trait]
impl CompletionProvider for LatestBuild {
    async fn complete(
        &self,
        _ctx: &AppContext,
        request: CompletionRequest<'_>,
    ) -> Result<Vec<String>> {
        if request.slot == "ID" {
            Ok(vec![LATEST.to_string()])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use aka_core::{complete, CompletionInput, PluginLoader, Settings};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::plugins::bundled;

    fn create_test_context(host: Option<String>) -> AppContext {
        let mut registry = CommandRegistry::new();
        let report = PluginLoader::load(&bundled(), &mut registry);
        assert!(report.failures.is_empty());

        let settings = Settings {
            api_host: host,
            tail_interval: Duration::from_millis(1),
            ..Settings::default()
        };
        AppContext::new(settings, registry).unwrap()
    }

    fn words(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn mount_builds(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/apps/api/builds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_listed_and_hidden_commands() {
        let ctx = create_test_context(None);
        let registry = ctx.registry();

        let listed: Vec<&str> = registry.visible().map(|c| c.name()).collect();
        assert_eq!(listed, vec!["builds", "builds:info", "builds:output"]);

        for hidden in ["build", "build:info", "builds:logs", "build:logs"] {
            assert!(registry.find(hidden).unwrap().is_hidden(), "{hidden}");
        }
    }

    #[tokio::test]
    async fn test_id_slot_completes_latest() {
        let ctx = create_test_context(None);

        let candidates = complete(
            &ctx,
            &CompletionInput::from_words(&words(&["aka", "builds:output", ""])),
        )
        .await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value, "latest");
    }

    #[tokio::test]
    async fn test_latest_resolves_to_last_build() {
        let server = MockServer::start().await;
        mount_builds(&server, serde_json::json!([{"id": "b1"}, {"id": "b2"}])).await;
        let ctx = create_test_context(Some(server.uri()));

        assert_eq!(resolve_build_id(&ctx, "api", None).await.unwrap(), "b2");
        assert_eq!(
            resolve_build_id(&ctx, "api", Some("CURRENT")).await.unwrap(),
            "b2"
        );
        assert_eq!(
            resolve_build_id(&ctx, "api", Some("b1")).await.unwrap(),
            "b1"
        );
    }

    #[tokio::test]
    async fn test_latest_without_builds_is_not_found() {
        let server = MockServer::start().await;
        mount_builds(&server, serde_json::json!([])).await;
        let ctx = create_test_context(Some(server.uri()));

        let err = resolve_build_id(&ctx, "api", Some("latest"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No builds were found.");
    }

    #[tokio::test]
    async fn test_follow_output_prints_each_line_once() {
        let server = MockServer::start().await;
        let stream_url = format!("{}/streams/b2", server.uri());

        Mock::given(method("GET"))
            .and(path("/apps/api/builds/b2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "b2", "output_stream_url": stream_url}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/streams/b2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"lines": ["a", "b"]})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/streams/b2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"lines": ["a", "b", "c", "Finished: SUCCESS"]}),
            ))
            .mount(&server)
            .await;

        let ctx = create_test_context(Some(server.uri()));
        let mut emitted = Vec::new();
        let outcome = follow_output(&ctx, "api", "b2", |line| emitted.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(emitted, vec!["a", "b", "c", "Finished: SUCCESS"]);
        assert_eq!(outcome.polls, 2);
    }

    #[tokio::test]
    async fn test_output_without_stream_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/api/builds/b9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "b9"})))
            .mount(&server)
            .await;
        let ctx = create_test_context(Some(server.uri()));

        let err = fetch_output(&ctx, "api", "b9").await.unwrap_err();
        assert!(matches!(err, AkaError::NotFound(_)));
    }

    #[test]
    fn test_format_build() {
        colored::control::set_override(false);
        let build: Build = serde_json::from_value(serde_json::json!({
            "id": "b1",
            "status": "succeeded",
            "source_blob": {
                "commit": "0123456789abcdef",
                "author": "sam",
                "message": "fix\nthe thing"
            }
        }))
        .unwrap();

        let text = format_build(&build);

        assert!(text.starts_with("• Build Id: b1\n"));
        assert!(text.contains("Created: unknown"));
        assert!(text.contains("Status: succeeded"));
        assert!(text.contains("Version: 0123456 - sam fix the thing"));
    }
}
