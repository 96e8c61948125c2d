use std::path::PathBuf;

use clap::Parser;

/// Flag that switches the binary into completion mode
pub const COMPLETION_FLAG: &str = "--get-completions";

#[derive(Parser, Debug)]
#[command(name = "aka")]
#[command(about = "Akkeris command line client")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Print full error details
    #[arg(long)]
    pub debug: bool,

    /// Base directory (default: ~/.akkeris)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Command followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_before_command() {
        let cli = Cli::try_parse_from([
            "aka",
            "--debug",
            "--base-dir",
            "/tmp/aka",
            "builds:info",
            "latest",
            "-a",
            "api",
        ])
        .unwrap();

        assert!(cli.debug);
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/aka")));
        assert_eq!(cli.args, vec!["builds:info", "latest", "-a", "api"]);
    }

    #[test]
    fn test_command_flags_are_left_to_the_command() {
        let cli = Cli::try_parse_from(["aka", "builds", "--debug", "--help"]).unwrap();

        assert!(!cli.debug);
        assert_eq!(cli.args, vec!["builds", "--debug", "--help"]);
    }

    #[test]
    fn test_help_flag_is_passed_through() {
        let cli = Cli::try_parse_from(["aka", "--help"]).unwrap();
        assert_eq!(cli.args, vec!["--help"]);
    }
}
