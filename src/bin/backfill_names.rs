// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-time migration: split legacy `name` into `first_name`/`last_name`.
//!
//! Safe to re-run; users without a legacy name are skipped. Pass
//! `--dry-run` to report without writing.

use clubhouse::{config::Config, db::FirestoreDb};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dry_run = std::env::args().any(|a| a == "--dry-run");

    let config = Config::from_env()?;
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await?
        .with_timeout(config.store_timeout);

    let users = db.list_users(None, None).await?;
    let mut updated = 0usize;

    for mut user in users {
        if !user.backfill_split_name() {
            continue;
        }
        tracing::info!(
            user_id = %user.id,
            first_name = %user.first_name,
            last_name = %user.last_name,
            dry_run,
            "Backfilling name"
        );
        if !dry_run {
            user.updated_at = chrono::Utc::now();
            db.upsert_user(&user).await?;
        }
        updated += 1;
    }

    tracing::info!(updated, dry_run, "Name backfill complete");
    Ok(())
}
