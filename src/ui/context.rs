//! UI context for detecting interactive vs unattended runs

use std::io::IsTerminal;

/// Environment variables set by schedulers and CI systems
const UNATTENDED_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "JENKINS_URL",
    "BUILDKITE",
    "INVOCATION_ID",
];

/// UI context that determines output behavior
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: Self::detect_interactive(),
        }
    }

    /// Create a non-interactive context (tests, `--format json`)
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Check if we should use fancy output (spinners, colors)
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    fn detect_interactive() -> bool {
        if !std::io::stdout().is_terminal() {
            return false;
        }

        // systemd sets INVOCATION_ID for timer-driven refreshes
        !UNATTENDED_VARS
            .iter()
            .any(|var| std::env::var_os(var).is_some())
    }
}
