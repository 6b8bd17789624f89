//! Backdrop: a faint, click-through image layer over every display.
//!
//! One overlay window per monitor, each refreshed on its own schedule with a
//! random remote image composited to fill the screen.

mod logging;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use backdrop_core::{AcquisitionClient, HttpTransport, RefreshController, Settings};
use backdrop_overlay::{SurfaceHandle, display_regions, get_all_monitors, spawn_surface};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    // Must outlive everything that logs
    let _log_guard = logging::init();

    let settings = Settings::default();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("backdrop-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let monitors = get_all_monitors();
    let regions = display_regions(&monitors);
    if regions.is_empty() {
        error!(monitors = monitors.len(), "no usable displays found");
        return ExitCode::FAILURE;
    }

    let transport = match HttpTransport::new(
        &settings.source.user_agent,
        settings.source.request_timeout(),
    ) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let client = Arc::new(AcquisitionClient::new(transport, settings.source.clone()));

    let mut surfaces = Vec::with_capacity(regions.len());
    for region in regions {
        let handle = match spawn_surface(region.clone(), &settings.surface) {
            Ok(handle) => handle,
            Err(e) => {
                error!(display = %region.id, error = %e, "failed to create overlay, skipping display");
                continue;
            }
        };

        let controller = RefreshController::new(
            &region,
            Arc::clone(&client),
            &settings,
            StdRng::from_entropy(),
            handle.installs(),
        );
        runtime.spawn(controller.run());

        info!(
            display = %region.id,
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "overlay started"
        );
        surfaces.push(handle);
    }

    if surfaces.is_empty() {
        error!("no overlay window could be created");
        return ExitCode::FAILURE;
    }

    runtime.block_on(wait_for_shutdown(&surfaces));

    for handle in surfaces {
        let display_id = handle.region().id.clone();
        let installs = handle.shutdown();
        info!(display = %display_id, installs, "overlay closed");
    }

    // In-flight fetches are abandoned
    runtime.shutdown_timeout(Duration::from_secs(1));
    ExitCode::SUCCESS
}

/// Resolve on Ctrl-C, or once every overlay window has gone away
async fn wait_for_shutdown(surfaces: &[SurfaceHandle]) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut signals = true;
    let mut check = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            result = &mut ctrl_c, if signals => match result {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    signals = false;
                }
            },
            _ = check.tick() => {
                if surfaces.iter().all(SurfaceHandle::is_finished) {
                    info!("all overlay windows closed");
                    return;
                }
            }
        }
    }
}
