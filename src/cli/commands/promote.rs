//! Promote command - apply a pending update the way a reader would

use crate::audit::{AuditEvent, AuditLog};
use crate::cache::{promote, Promotion};
use crate::cli::args::PromoteArgs;
use crate::cli::commands::open_cache;
use crate::config::Config;
use crate::error::CacheResult;
use crate::ui::{self, UiContext};

/// Execute the promote command
pub async fn execute(args: PromoteArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let cache = open_cache(&args.cache, config).await?;

    match promote(&cache).await? {
        Promotion::NothingPending => {
            ui::step_info(&ctx, "No pending update to promote");
        }
        Promotion::Promoted { live } => {
            for path in &live {
                ui::step_ok(&ctx, &format!("Promoted {}", path.display()));
            }
            AuditLog::new(config)
                .record(&AuditEvent::cache_promoted(&cache, &live))
                .await;
            ui::outro_success(&ctx, &format!("Promoted {} artifact(s)", live.len()));
        }
    }

    Ok(())
}
