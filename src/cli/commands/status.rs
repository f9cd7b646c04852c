//! Status command - show the state of a cache directory

use crate::audit::{AuditEntry, AuditLog};
use crate::cache::{signal, CacheDirectory, CacheSnapshot, MarkerState, SHADOW_SUFFIX};
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::commands::open_cache;
use crate::config::Config;
use crate::error::CacheResult;
use crate::ui::{self, UiContext};
use chrono::Duration;
use serde::Serialize;

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> CacheResult<()> {
    let cache = open_cache(&args.cache, config).await?;
    let snapshot = cache.snapshot().await?;
    let marker = signal::inspect(&cache).await?;
    let stale_after = Duration::hours(i64::from(config.cache.stale_after_hours));
    let last_event = AuditLog::new(config).last_for(cache.path()).await;

    let view = StatusView {
        cache: &cache,
        snapshot: &snapshot,
        marker: &marker,
        stale_after,
        last_event: last_event.as_ref(),
    };
    match args.format {
        OutputFormat::Table => print_summary(&view),
        OutputFormat::Json => print_json(&view)?,
    }

    Ok(())
}

/// Everything `status` reports about one cache directory
struct StatusView<'a> {
    cache: &'a CacheDirectory,
    snapshot: &'a CacheSnapshot,
    marker: &'a MarkerState,
    stale_after: Duration,
    last_event: Option<&'a AuditEntry>,
}

fn print_summary(view: &StatusView<'_>) {
    let StatusView {
        cache,
        snapshot,
        marker,
        stale_after,
        last_event,
    } = *view;
    let ctx = UiContext::detect();
    ui::header(&ctx, &format!("Cache {}", cache.path().display()));

    ui::key_value(&ctx, "Live artifacts", &snapshot.live.len().to_string());
    for name in &snapshot.live {
        ui::entry(&ctx, name);
    }

    ui::key_value(&ctx, "Staged artifacts", &snapshot.shadow.len().to_string());
    let new_artifacts = snapshot.new_artifacts();
    for name in &snapshot.shadow {
        let is_new = name
            .strip_suffix(SHADOW_SUFFIX)
            .is_some_and(|live| new_artifacts.contains(&live));
        if is_new {
            ui::entry_detail(&ctx, name, "new artifact");
        } else {
            ui::entry(&ctx, name);
        }
    }

    let marker_text = match (marker.present, marker.age) {
        (false, _) => "absent".to_string(),
        (true, Some(age)) => format!("present ({}m old)", age.num_minutes().max(0)),
        (true, None) => "present".to_string(),
    };
    ui::key_value_status(
        &ctx,
        "Update marker",
        &marker_text,
        !marker.is_stale(stale_after),
    );

    if let Some(entry) = last_event {
        ui::key_value(
            &ctx,
            "Last event",
            &format!(
                "{} at {}",
                entry.event,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        );
    }

    if marker.present && snapshot.shadow.is_empty() {
        ui::step_warn(&ctx, "Marker is set but no staged files exist");
    } else if !marker.present && !snapshot.shadow.is_empty() {
        ui::step_info(
            &ctx,
            "Staged files without a marker are leftovers of an interrupted update",
        );
    }

    if !snapshot.other.is_empty() {
        ui::step_warn(
            &ctx,
            &format!("Unexpected entries: {}", snapshot.other.join(", ")),
        );
    }
}

fn print_json(view: &StatusView<'_>) -> CacheResult<()> {
    #[derive(Serialize)]
    struct StatusJson<'a> {
        cache_dir: String,
        #[serde(flatten)]
        snapshot: &'a CacheSnapshot,
        new_artifacts: Vec<&'a str>,
        marker_age_secs: Option<i64>,
        marker_stale: bool,
        last_event: Option<&'a AuditEntry>,
    }

    let status = StatusJson {
        cache_dir: view.cache.path().display().to_string(),
        snapshot: view.snapshot,
        new_artifacts: view.snapshot.new_artifacts(),
        marker_age_secs: view.marker.age.map(|age| age.num_seconds()),
        marker_stale: view.marker.is_stale(view.stale_after),
        last_event: view.last_event,
    };

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
