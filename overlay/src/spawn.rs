//! Surface threads
//!
//! Each display gets one OS thread that owns its native window for the
//! window's whole life. Composites arrive on a bounded channel; the thread
//! installs them, pumps window events, re-applies window attributes on a
//! timer and sleeps between iterations.
//!
//! # Threading
//!
//! On Windows an HWND's message queue belongs to the thread that created it,
//! so the window is created INSIDE the spawned thread by a factory function
//! rather than handed over pre-built.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use backdrop_core::{CompositeImage, DisplayRegion, OverlaySurface, SurfaceSettings};
use tokio::sync::mpsc::{self, Sender};
use tracing::{debug, info, warn};

use crate::manager::OverlayWindow;
use crate::platform::{NativeOverlay, OverlayConfig, OverlayPlatform, PlatformError};

/// Control messages for a surface thread
#[derive(Debug)]
pub enum SurfaceCommand {
    Shutdown,
}

/// Owner's side of a running surface thread
pub struct SurfaceHandle {
    region: DisplayRegion,
    installs: Sender<CompositeImage>,
    commands: Sender<SurfaceCommand>,
    thread: JoinHandle<u64>,
}

impl SurfaceHandle {
    pub fn region(&self) -> &DisplayRegion {
        &self.region
    }

    /// Sender for composites bound for this surface
    pub fn installs(&self) -> Sender<CompositeImage> {
        self.installs.clone()
    }

    /// True once the thread has exited (window closed or shut down)
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Ask the thread to close its window and wait for it.
    /// Returns how many composites the surface installed.
    pub fn shutdown(self) -> u64 {
        let _ = self.commands.try_send(SurfaceCommand::Shutdown);
        match self.thread.join() {
            Ok(installs) => installs,
            Err(_) => {
                warn!(display = %self.region.id, "surface thread panicked");
                0
            }
        }
    }
}

/// Spawn a native overlay surface covering `region`
pub fn spawn_surface(
    region: DisplayRegion,
    settings: &SurfaceSettings,
) -> Result<SurfaceHandle, String> {
    spawn_surface_with_factory(region, settings, |config, opacity| {
        OverlayWindow::<NativeOverlay>::new(config, opacity)
    })
}

/// Spawn a surface whose window is built by `create_window` inside the thread.
///
/// Returns `Err` if window creation fails (confirmed via channel from the
/// spawned thread).
pub fn spawn_surface_with_factory<P, F>(
    region: DisplayRegion,
    settings: &SurfaceSettings,
    create_window: F,
) -> Result<SurfaceHandle, String>
where
    P: OverlayPlatform + 'static,
    F: FnOnce(OverlayConfig, f32) -> Result<OverlayWindow<P>, PlatformError> + Send + 'static,
{
    let (installs_tx, mut installs_rx) =
        mpsc::channel::<CompositeImage>(settings.install_queue.max(1));
    let (commands_tx, mut commands_rx) = mpsc::channel::<SurfaceCommand>(4);

    // Creation result comes back from the spawned thread
    let (confirm_tx, confirm_rx) = std::sync::mpsc::channel::<Result<(), String>>();

    let config = OverlayConfig::for_region(&region);
    let thread_region = region.clone();
    let settings = settings.clone();

    let thread = thread::Builder::new()
        .name(format!("surface-{}", region.id))
        .spawn(move || {
            let window = match create_window(config, settings.opacity) {
                Ok(w) => {
                    let _ = confirm_tx.send(Ok(()));
                    w
                }
                Err(e) => {
                    let _ = confirm_tx.send(Err(e.to_string()));
                    return 0;
                }
            };

            let mut surface = OverlaySurface::new(thread_region, window);
            let reassert_every = settings.reassert_interval();
            let mut last_reassert = Instant::now();

            loop {
                // Apply composites in arrival order
                while let Ok(image) = installs_rx.try_recv() {
                    surface.install(image);
                }

                match commands_rx.try_recv() {
                    Ok(SurfaceCommand::Shutdown) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => break,
                    Err(mpsc::error::TryRecvError::Empty) => {}
                }

                // Poll window events (returns false if window should close)
                if !surface.presenter_mut().poll_events() {
                    info!(display = %surface.region().id, "overlay window closed");
                    break;
                }

                if surface.presenter_mut().take_needs_redraw() {
                    surface.redraw();
                }

                if last_reassert.elapsed() >= reassert_every {
                    surface.maintain();
                    last_reassert = Instant::now();
                }

                thread::sleep(settings.poll_interval());
            }

            debug!(
                display = %surface.region().id,
                installs = surface.installs(),
                "surface thread exiting"
            );
            surface.installs()
        })
        .map_err(|e| format!("failed to spawn surface thread: {e}"))?;

    // Wait for confirmation from the spawned thread
    match confirm_rx.recv() {
        Ok(Ok(())) => Ok(SurfaceHandle {
            region,
            installs: installs_tx,
            commands: commands_tx,
            thread,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err("Surface thread exited before confirming creation".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::HeadlessOverlay;
    use image::{Rgba, RgbaImage};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn region(width: u32, height: u32) -> DisplayRegion {
        DisplayRegion {
            id: "DP-3".to_string(),
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    fn fast_settings(reassert_interval_ms: u64) -> SurfaceSettings {
        SurfaceSettings {
            reassert_interval_ms,
            poll_interval_ms: 1,
            ..SurfaceSettings::default()
        }
    }

    fn spawn_headless(
        region: DisplayRegion,
        settings: &SurfaceSettings,
    ) -> (SurfaceHandle, std_mpsc::Receiver<&'static str>) {
        let (events_tx, events_rx) = std_mpsc::channel();
        let handle = spawn_surface_with_factory(region, settings, move |config, opacity| {
            let mut window = OverlayWindow::<HeadlessOverlay>::new(config, opacity)?;
            window.platform_mut().events = Some(events_tx);
            Ok(window)
        })
        .unwrap();
        (handle, events_rx)
    }

    fn wait_for(events: &std_mpsc::Receiver<&'static str>, wanted: &str) {
        loop {
            match events.recv_timeout(WAIT) {
                Ok(event) if event == wanted => return,
                Ok(_) => continue,
                Err(e) => panic!("no {wanted} event: {e}"),
            }
        }
    }

    #[test]
    fn test_installed_composite_is_committed_on_surface_thread() {
        let (handle, events) = spawn_headless(region(4, 4), &fast_settings(60_000));

        let frame = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        handle.installs().blocking_send(frame.into()).unwrap();
        wait_for(&events, "commit");

        assert_eq!(handle.shutdown(), 1);
    }

    #[test]
    fn test_wrong_sized_composite_is_not_presented() {
        let (handle, events) = spawn_headless(region(4, 4), &fast_settings(60_000));

        let frame = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        handle.installs().blocking_send(frame.into()).unwrap();
        let good = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        handle.installs().blocking_send(good.into()).unwrap();
        wait_for(&events, "commit");

        assert_eq!(handle.shutdown(), 1);
    }

    #[test]
    fn test_attributes_are_reasserted_periodically() {
        let (handle, events) = spawn_headless(region(2, 2), &fast_settings(1));

        wait_for(&events, "reassert");
        wait_for(&events, "reassert");

        assert_eq!(handle.shutdown(), 0);
    }

    #[test]
    fn test_window_creation_failure_is_reported() {
        let result = spawn_surface_with_factory(region(0, 0), &fast_settings(1000), |config, opacity| {
            OverlayWindow::<HeadlessOverlay>::new(config, opacity)
        });

        let Err(message) = result else {
            panic!("zero-sized window should fail");
        };
        assert!(message.contains("zero-sized"));
    }

    #[test]
    fn test_shutdown_closes_install_channel() {
        let (handle, _events) = spawn_headless(region(2, 2), &fast_settings(1000));
        let installs = handle.installs();

        handle.shutdown();

        assert!(installs.is_closed());
    }
}
