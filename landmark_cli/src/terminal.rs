//! Terminal detection
//!
//! Decides whether spinners and prompts make sense for the current session.

use is_terminal::IsTerminal;
use std::env;
use std::io::{stderr, stdout};

const CI_VARS: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "JENKINS_URL",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "TF_BUILD",
];

/// True when stdout is a terminal a person is looking at
pub fn is_interactive() -> bool {
    stdout().is_terminal()
        && !is_ci_environment()
        && env::var("DEBIAN_FRONTEND").unwrap_or_default() != "noninteractive"
}

/// True when the terminal can render escape sequences
pub fn supports_ansi() -> bool {
    if !is_interactive() {
        return false;
    }
    let term = env::var("TERM").unwrap_or_default();
    if cfg!(windows) {
        return term != "dumb";
    }
    !(term.is_empty() || term == "dumb")
}

/// Progress is drawn on stderr
pub fn stderr_is_terminal() -> bool {
    stderr().is_terminal()
}

fn is_ci_environment() -> bool {
    CI_VARS.iter().any(|var| env::var_os(var).is_some())
}

/// Whether the identify spinner should be shown when not asked explicitly
pub fn should_show_progress_by_default() -> bool {
    is_interactive() && stderr_is_terminal() && supports_ansi()
}
