//! Update command - run one refresh cycle

use crate::audit::{AuditEvent, AuditLog};
use crate::cli::args::UpdateArgs;
use crate::cli::commands::open_cache;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::fetch::create_source;
use crate::refresh::{RefreshCycle, RefreshOptions, RefreshReport};
use crate::ui::{self, TaskSpinner, UiContext};
use std::time::Duration;

/// Execute the update command
pub async fn execute(args: UpdateArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let audit = AuditLog::new(config);
    let cache = open_cache(&args.cache, config).await?;

    let url = args.source.as_deref().unwrap_or(&config.source.url);
    let timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.source.timeout(),
    };
    let source = create_source(url, timeout)?;

    let options = RefreshOptions {
        force: args.force,
        subtrees: config.source.subtrees.clone(),
        work_dir: config.cache.work_dir.clone(),
        stale_after: chrono::Duration::hours(i64::from(config.cache.stale_after_hours)),
    };
    let cycle = RefreshCycle::new(&cache, source.as_ref(), options);
    let cycle_id = cycle.id();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Updating {} from {}", cache.path().display(), url));

    match cycle.run().await {
        Ok(report) => {
            spinner.stop(&format!("Staged {} artifact(s)", report.staged.len()));
            print_report(&ctx, &report);
            audit
                .record(&AuditEvent::refresh_completed(&cache, &report))
                .await;
            Ok(())
        }
        Err(e) => {
            match e {
                CacheError::PendingUpdate { .. } => {
                    spinner.stop_warn("Previous update not yet processed")
                }
                _ if e.is_retryable() => spinner.stop_error("Update failed, retry later"),
                _ => spinner.stop_error("Update failed"),
            }
            audit
                .record(&AuditEvent::refresh_rejected(&cache, cycle_id, url, &e))
                .await;
            Err(e)
        }
    }
}

fn print_report(ctx: &UiContext, report: &RefreshReport) {
    if report.overrode_pending {
        ui::step_warn(ctx, "Replaced an update the reader had not processed yet");
    }

    for artifact in &report.staged {
        ui::step_ok_detail(
            ctx,
            &artifact.name,
            &format!("{} bytes, sha256 {}", artifact.size, artifact.digest),
        );
    }

    if let Some(ref warning) = report.cleanup_warning {
        ui::step_warn_hint(ctx, &warning.to_string(), "Remove it manually to free disk space");
    }

    ui::outro_success(
        ctx,
        &format!("Update ready, signalled via {}", report.marker.display()),
    );
}
