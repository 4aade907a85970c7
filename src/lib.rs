//! Sketchtale - sketch canvas engine and story backend client
//!
//! This is the main library crate: the raster canvas with undo/redo lives
//! in [`canvas`], the backend client with polling in [`api`].

pub mod api;
pub mod canvas;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
pub fn init() {
    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchtale=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sketchtale initializing...");
}
