//! Terminal output with a plain-text fallback
//!
//! Uses `cliclack` for spinners and step lines in an interactive terminal,
//! and prints `[OK]`/`[WARN]` prefixed lines when running under cron, CI or
//! with output redirected.

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{
    entry, entry_detail, header, key_value, key_value_status, outro_success, step_info, step_ok,
    step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use theme::{init_theme, CacheTheme};
