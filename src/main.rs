// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role Hub API Server
//!
//! Resolves backend sessions and profile rows into role levels for the
//! event-planning frontend and guards member and admin pages.

use anyhow::Context;
use role_hub::{backend, config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Role Hub API");
    tracing::info!(
        admin_emails = config.admin_emails.len(),
        admin_phones = config.admin_phones.len(),
        poll_secs = config.approval_poll_interval.as_secs(),
        "Authorization policy loaded"
    );

    // Backend handle; absent when not configured
    let backend =
        backend::connect(config.backend.as_ref()).context("Failed to initialize backend client")?;

    // Build shared state
    let port = config.port;
    let state = Arc::new(AppState::new(config, backend));

    // Build router
    let app = role_hub::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("role_hub=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
