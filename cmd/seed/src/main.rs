//! # seed
//!
//! Creates the default boards and, when `COMFY_ADMIN_USERNAME` and
//! `COMFY_ADMIN_PASSWORD` are set, an admin account. Safe to re-run.

use std::sync::Arc;

use anyhow::{bail, Context};
use auth_adapters::hash_password;
use configs::Settings;
use domains::{Admin, AdminRepository, SystemClock};
use storage_adapters::{CapacityPruner, LocalMediaStorage, SqliteStore};
use tracing::info;

const DEFAULT_BOARDS: [(&str, &str, &str); 3] = [
    ("comfy", "Comfy", "Relax and chat"),
    ("h1", "Hardware", "Builds, parts and repairs"),
    ("meta", "Meta", "Site feedback"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    comfyboard::init_tracing(&settings.log);

    let pool = storage_adapters::connect(&settings.database.url, 1)
        .await
        .with_context(|| format!("opening database {}", settings.database.url))?;
    let media = Arc::new(LocalMediaStorage::new(
        &settings.media.full_dir,
        &settings.media.thumb_dir,
    ));
    media.ensure_dirs().await?;
    let store = SqliteStore::new(
        pool,
        media,
        Arc::new(SystemClock),
        CapacityPruner::new(settings.board.max_threads),
    );

    for (slug, name, tag) in DEFAULT_BOARDS {
        let board = store.put_board(slug, name, tag).await?;
        info!(board = %board.slug, id = board.id, "board seeded");
    }

    match (
        std::env::var("COMFY_ADMIN_USERNAME").ok(),
        std::env::var("COMFY_ADMIN_PASSWORD").ok(),
    ) {
        (Some(username), Some(password)) => {
            if username.trim().is_empty() || password.is_empty() {
                bail!("admin username and password must not be empty");
            }
            let password_hash = hash_password(&password)?;
            store.put_admin(Admin { username: username.clone(), password_hash }).await?;
            info!(%username, "admin seeded");
        }
        (None, None) => info!("no admin credentials given; skipping admin"),
        _ => bail!("set both COMFY_ADMIN_USERNAME and COMFY_ADMIN_PASSWORD"),
    }

    store.pool().close().await;
    Ok(())
}
