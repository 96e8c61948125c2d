//! Shell integration for completion mode

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use aka_core::{AkaError, CandidateStyle, Result};
use clap_complete::Shell;

use crate::args::COMPLETION_FLAG;

/// Set by the installed hooks so candidates are rendered for the right shell
pub const COMPLETION_SHELL_ENV: &str = "AKA_COMPLETION_SHELL";

const BEGIN_MARKER: &str = "###-begin-aka-completions-###";

/// Shell the completion request comes from
pub fn completion_shell() -> Option<Shell> {
    std::env::var(COMPLETION_SHELL_ENV)
        .ok()
        .and_then(|name| Shell::from_str(&name).ok())
        .or_else(Shell::from_env)
}

pub fn candidate_style(shell: Option<Shell>) -> CandidateStyle {
    match shell {
        Some(Shell::Zsh) => CandidateStyle::Described,
        _ => CandidateStyle::Plain,
    }
}

/// Parse `--shell`, falling back to the login shell
pub fn resolve_shell(requested: Option<&str>) -> Result<Shell> {
    match requested {
        Some(name) => match Shell::from_str(name) {
            Ok(shell @ (Shell::Bash | Shell::Zsh)) => Ok(shell),
            _ => Err(AkaError::user_input(format!(
                "Unsupported shell '{name}'. Use bash or zsh."
            ))),
        },
        None => Ok(match Shell::from_env() {
            Some(Shell::Zsh) => Shell::Zsh,
            _ => Shell::Bash,
        }),
    }
}

/// Startup file the hook is appended to
pub fn rc_file(shell: Shell, home: &Path) -> PathBuf {
    match shell {
        Shell::Zsh => home.join(".zshrc"),
        _ => home.join(".bash_profile"),
    }
}

pub fn hook_script(shell: Shell, program: &str) -> String {
    match shell {
        Shell::Zsh => format!(
            r#"
{BEGIN_MARKER}
_aka_completions()
{{
  local reply
  local si=$IFS
  IFS=$'\n' reply=($({COMPLETION_SHELL_ENV}=zsh {program} {COMPLETION_FLAG} "${{(@)words[1,CURRENT]}}"))
  IFS=$si
  _describe 'values' reply
}}
compdef _aka_completions {program}
###-end-aka-completions-###
"#
        ),
        _ => format!(
            r#"
{BEGIN_MARKER}
_aka_completions()
{{
    local line="${{COMP_LINE:0:COMP_POINT}}"
    local -a words
    read -ra words <<< "$line"
    [[ "$line" == *[[:space:]] ]] && words+=("")

    local cur="${{words[${{#words[@]}}-1]}}"
    local type_list
    type_list=$({COMPLETION_SHELL_ENV}=bash {program} {COMPLETION_FLAG} "${{words[@]}}")

    COMPREPLY=( $(compgen -W "${{type_list}}" -- "${{cur}}") )

    # COMP_WORDBREAKS splits at ':', so reply with the text after the last one
    if [[ "$cur" == *:* ]]; then
      local prefix="${{cur%"${{cur##*:}}"}}"
      local i
      for i in "${{!COMPREPLY[@]}}"; do
        COMPREPLY[$i]="${{COMPREPLY[$i]#"$prefix"}}"
      done
    fi

    if [ ${{#COMPREPLY[@]}} -eq 0 ]; then
      COMPREPLY=( $(compgen -f -- "${{cur}}") )
    fi

    return 0
}}
complete -o default -F _aka_completions {program}
###-end-aka-completions-###
"#
        ),
    }
}

/// Append the hook to the shell's startup file
///
/// Returns the file written, or `None` when the hook was already there.
pub fn install_hook(shell: Shell, home: &Path, program: &str) -> Result<Option<PathBuf>> {
    let path = rc_file(shell, home);
    if std::fs::read_to_string(&path).is_ok_and(|content| content.contains(BEGIN_MARKER)) {
        return Ok(None);
    }

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(hook_script(shell, program).as_bytes())?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_zsh_hook_passes_words_up_to_cursor() {
        let script = hook_script(Shell::Zsh, "aka");

        assert!(script.contains(
            r#"AKA_COMPLETION_SHELL=zsh aka --get-completions "${(@)words[1,CURRENT]}""#
        ));
        assert!(script.contains("compdef _aka_completions aka"));
    }

    #[test]
    fn test_bash_hook_passes_words_up_to_cursor() {
        let script = hook_script(Shell::Bash, "aka");

        assert!(script.contains(r#"AKA_COMPLETION_SHELL=bash aka --get-completions "${words[@]}""#));
        assert!(script.contains(r#""${COMP_LINE:0:COMP_POINT}""#));
        assert!(script.contains("complete -o default -F _aka_completions aka"));
    }

    #[cfg(unix)]
    #[test]
    fn test_bash_hook_keeps_colon_commands_whole() {
        let line = "fake_aka builds:in";
        let script = format!(
            r#"fake_aka() {{ printf '%s|' "$@" >&2; printf 'builds:info\nbuilds:output\n'; }}
{}
COMP_LINE="{line}"
COMP_POINT={}
_aka_completions
printf '%s\n' "${{COMPREPLY[@]}}"
"#,
            hook_script(Shell::Bash, "fake_aka"),
            line.len()
        );

        let Ok(output) = std::process::Command::new("bash")
            .args(["--norc", "-c", &script])
            .output()
        else {
            return;
        };

        assert_eq!(String::from_utf8_lossy(&output.stdout), "info\n");
        assert_eq!(
            String::from_utf8_lossy(&output.stderr),
            "--get-completions|fake_aka|builds:in|"
        );
    }

    #[test]
    fn test_install_hook_appends_once() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".zshrc"), "export EDITOR=vi\n").unwrap();

        let written = install_hook(Shell::Zsh, temp.path(), "aka").unwrap();
        assert_eq!(written, Some(temp.path().join(".zshrc")));

        let again = install_hook(Shell::Zsh, temp.path(), "aka").unwrap();
        assert_eq!(again, None);

        let content = fs::read_to_string(temp.path().join(".zshrc")).unwrap();
        assert!(content.starts_with("export EDITOR=vi\n"));
        assert_eq!(content.matches(BEGIN_MARKER).count(), 1);
    }

    #[test]
    fn test_bash_hook_goes_to_bash_profile() {
        let temp = TempDir::new().unwrap();

        install_hook(Shell::Bash, temp.path(), "aka").unwrap();
        assert!(temp.path().join(".bash_profile").exists());
    }

    #[test]
    fn test_resolve_shell() {
        assert_eq!(resolve_shell(Some("zsh")).unwrap(), Shell::Zsh);
        assert_eq!(resolve_shell(Some("bash")).unwrap(), Shell::Bash);
        assert!(matches!(
            resolve_shell(Some("fish")),
            Err(AkaError::UserInput(_))
        ));
    }

    #[test]
    fn test_candidate_style() {
        assert_eq!(candidate_style(Some(Shell::Zsh)), CandidateStyle::Described);
        assert_eq!(candidate_style(Some(Shell::Bash)), CandidateStyle::Plain);
        assert_eq!(candidate_style(None), CandidateStyle::Plain);
    }
}
