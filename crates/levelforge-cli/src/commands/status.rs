//! Status command handler

use anyhow::Result;

use levelforge_core::{HandleState, Store, SCHEMA_VERSION};

use crate::output::{format_bytes, Output, OutputFormat};

/// Show database location, quota usage and record counts
pub async fn show(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();

    // Opening failures are reported as status, not as a command error
    let open_error = store.open().await.err();
    let breakdown = match open_error {
        None => Some(store.get_storage_breakdown().await?),
        Some(_) => None,
    };
    let estimate = store.get_storage_estimate().await;
    let migration = store
        .migration_outcome()
        .map(|outcome| outcome.map(|report| report.total()));

    let state = match store.state() {
        HandleState::Ready => "ready",
        HandleState::Unavailable => "unavailable",
        HandleState::Opening => "opening",
        HandleState::Uninitialized => "uninitialized",
    };

    match output.format {
        OutputFormat::Json => {
            let migration = match migration {
                Some(Ok(total)) => serde_json::json!({"ok": true, "migrated": total}),
                Some(Err(reason)) => serde_json::json!({"ok": false, "error": reason}),
                None => serde_json::Value::Null,
            };
            output.print_json(&serde_json::json!({
                "state": state,
                "error": open_error.as_ref().map(|e| e.to_string()),
                "database": config.database_path(),
                "schema_version": SCHEMA_VERSION,
                "migration": migration,
                "estimate": estimate,
                "counts": breakdown,
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", state);
        }
        OutputFormat::Human => {
            println!("LevelForge Status");
            println!("=================");
            println!();
            println!("Database:");
            println!("  Location: {}", config.database_path().display());
            println!("  State:    {}", state);
            println!("  Schema:   v{}", SCHEMA_VERSION);
            if let Some(ref e) = open_error {
                println!("  Error:    {}", e);
                if let Some(hint) = e.recovery_suggestion() {
                    println!("  Hint:     {}", hint);
                }
            }
            match migration {
                Some(Ok(total)) => println!("  Legacy:   migrated ({} record(s) this run)", total),
                Some(Err(reason)) => println!("  Legacy:   migration failed: {}", reason),
                None => {}
            }
            println!();
            println!("Quota:");
            match estimate {
                Some(estimate) => {
                    println!(
                        "  Usage: {} of {} ({:.1}%)",
                        format_bytes(estimate.usage),
                        format_bytes(estimate.quota),
                        estimate.usage_ratio * 100.0
                    );
                    println!("  Free:  {}", format_bytes(estimate.remaining));
                    if estimate.usage_ratio >= config.warn_ratio {
                        println!("  ⚠ Running low on space. Try `levelforge clear backgrounds`.");
                    }
                }
                None => println!("  (no quota configured)"),
            }
            if let Some(breakdown) = breakdown {
                println!();
                println!("Contents:");
                for (collection, count) in breakdown.counts() {
                    println!("  {:<18} {}", format!("{}:", collection), count);
                }
                println!("  {:<18} {}", "total:", breakdown.total());
            }
        }
    }

    Ok(())
}
