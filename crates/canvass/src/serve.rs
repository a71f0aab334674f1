// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations: the serve loop, one-shot sweeps, and campaign
//! control.

use std::time::Duration;

use canvass_config::CanvassConfig;
use canvass_core::CanvassError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::App;

/// Runs the engine until SIGTERM or SIGINT: a follow-up sweep every
/// `scheduler.sweep_interval_secs`.
pub async fn run_serve(config: CanvassConfig) -> Result<(), CanvassError> {
    let app = App::build(&config).await?;
    let interval = Duration::from_secs(config.scheduler.sweep_interval_secs);
    let cancel = install_signal_handler();
    info!(interval_s = interval.as_secs(), "canvass serve started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        match app.scheduler.sweep().await {
            Ok(report) if report.processed > 0 => {
                info!(
                    processed = report.processed,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "sweep pass done"
                );
            }
            Ok(_) => debug!("sweep pass done, nothing due"),
            // A failed pass is retried on the next tick.
            Err(e) => warn!(error = %e, "sweep pass failed"),
        }
    }

    app.db.close().await?;
    info!("canvass serve shutdown complete");
    Ok(())
}

/// Runs a single sweep pass and prints the tally.
pub async fn run_sweep(config: CanvassConfig) -> Result<(), CanvassError> {
    let app = App::build(&config).await?;
    let report = app.scheduler.sweep().await?;
    println!(
        "sweep: processed={} succeeded={} failed={}",
        report.processed, report.succeeded, report.failed
    );
    app.db.close().await?;
    Ok(())
}

/// Starts a draft campaign and waits for its run to finish.
pub async fn run_campaign_start(
    config: CanvassConfig,
    campaign_id: &str,
) -> Result<(), CanvassError> {
    let app = App::build(&config).await?;
    let receipt = app.dispatcher.start(campaign_id).await?;
    println!("campaign {campaign_id}: started, {} recipients", receipt.recipients);
    while app.dispatcher.is_running(campaign_id).await {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    let campaign = canvass_storage::queries::campaigns::get_by_id(&app.db, campaign_id)
        .await?
        .ok_or_else(|| CanvassError::Internal(format!("campaign {campaign_id} disappeared")))?;
    println!(
        "campaign {campaign_id}: status={} sent={} failed={}",
        campaign.status, campaign.sent_count, campaign.failed_count
    );
    app.db.close().await?;
    Ok(())
}

/// Pauses a running campaign.
pub async fn run_campaign_stop(
    config: CanvassConfig,
    campaign_id: &str,
) -> Result<(), CanvassError> {
    let app = App::build(&config).await?;
    app.dispatcher.stop(campaign_id).await?;
    println!("campaign {campaign_id}: paused");
    app.db.close().await?;
    Ok(())
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("canvass={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
