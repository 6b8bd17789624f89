//! Per-display refresh loop.
//!
//! After a short initial delay the controller fires a tick every interval.
//! Each tick is its own task: acquire a URL, download and decode the image,
//! build the composite on the blocking pool, then hand it to the surface
//! thread through the install channel. A failed tick just ends; the surface
//! keeps the previous composite and the next tick is the retry.
//!
//! Ticks are never cancelled and may overlap when a download outlives the
//! interval. In that case whichever tick finishes last is installed last.

use std::sync::Arc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::acquire::{AcquireError, AcquisitionClient, Transport, decode_image};
use crate::composite::{CompositeImage, CompositeStyle, build_composite};
use crate::geometry::{DisplayRegion, Size};
use crate::settings::{ScheduleSettings, Settings};

/// Where a tick currently is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Fetching,
    Compositing,
    Installing,
}

/// How a tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Composite handed to the surface thread
    Delivered,
    /// Acquisition, download or decode failed; nothing was sent
    Abandoned,
    /// Composite was built but the surface is gone
    SurfaceClosed,
}

pub struct RefreshController<T> {
    display: String,
    target: Size,
    client: Arc<AcquisitionClient<T>>,
    style: CompositeStyle,
    schedule: ScheduleSettings,
    rng: StdRng,
    installs: mpsc::Sender<CompositeImage>,
    phase: Arc<watch::Sender<TickPhase>>,
    ticks: u64,
}

impl<T: Transport> RefreshController<T> {
    /// Create a controller feeding `installs` with composites sized to `region`.
    ///
    /// `rng` drives every random choice this controller makes; seed it for
    /// reproducible runs.
    pub fn new(
        region: &DisplayRegion,
        client: Arc<AcquisitionClient<T>>,
        settings: &Settings,
        rng: StdRng,
        installs: mpsc::Sender<CompositeImage>,
    ) -> Self {
        let (phase, _) = watch::channel(TickPhase::Idle);
        Self {
            display: region.id.clone(),
            target: region.size(),
            client,
            style: settings.composite,
            schedule: settings.schedule.clone(),
            rng,
            installs,
            phase: Arc::new(phase),
            ticks: 0,
        }
    }

    /// Watch the phase of the most recently advanced tick
    pub fn phase(&self) -> watch::Receiver<TickPhase> {
        self.phase.subscribe()
    }

    /// Start one tick in the background.
    ///
    /// The tick gets its own generator derived from the controller's, so a
    /// fixed seed reproduces the same sequence of picks.
    pub fn spawn_tick(&mut self) -> JoinHandle<TickOutcome> {
        self.ticks += 1;
        let tick = Tick {
            seq: self.ticks,
            display: self.display.clone(),
            target: self.target,
            client: Arc::clone(&self.client),
            style: self.style,
            rng: StdRng::seed_from_u64(self.rng.next_u64()),
            installs: self.installs.clone(),
            phase: Arc::clone(&self.phase),
        };
        tokio::spawn(tick.run())
    }

    /// Run the schedule until the surface side hangs up
    pub async fn run(mut self) {
        info!(
            display = %self.display,
            width = self.target.width,
            height = self.target.height,
            interval_secs = self.schedule.interval().as_secs(),
            "refresh loop started"
        );

        tokio::time::sleep(self.schedule.initial_delay()).await;

        let mut interval = tokio::time::interval(self.schedule.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if self.installs.is_closed() {
                break;
            }
            // Fire and forget: the handle is dropped, the task keeps running
            drop(self.spawn_tick());
        }

        info!(display = %self.display, ticks = self.ticks, "refresh loop stopped");
    }
}

struct Tick<T> {
    seq: u64,
    display: String,
    target: Size,
    client: Arc<AcquisitionClient<T>>,
    style: CompositeStyle,
    rng: StdRng,
    installs: mpsc::Sender<CompositeImage>,
    phase: Arc<watch::Sender<TickPhase>>,
}

impl<T: Transport> Tick<T> {
    async fn run(mut self) -> TickOutcome {
        let outcome = self.advance().await;
        self.enter(TickPhase::Idle);
        debug!(display = %self.display, tick = self.seq, ?outcome, "tick finished");
        outcome
    }

    async fn advance(&mut self) -> TickOutcome {
        if self.target.is_empty() {
            warn!(display = %self.display, "display has no area, skipping tick");
            return TickOutcome::Abandoned;
        }

        self.enter(TickPhase::Fetching);
        let Some(url) = self.client.fetch_random_image_url(&mut self.rng).await else {
            return TickOutcome::Abandoned;
        };
        let Some(bytes) = self.client.fetch_image_bytes(&url).await else {
            return TickOutcome::Abandoned;
        };

        self.enter(TickPhase::Compositing);
        let Some(composite) = self.compose(bytes).await else {
            return TickOutcome::Abandoned;
        };

        self.enter(TickPhase::Installing);
        match self.installs.send(composite).await {
            Ok(()) => {
                info!(display = %self.display, tick = self.seq, %url, "new image queued");
                TickOutcome::Delivered
            }
            Err(_) => TickOutcome::SurfaceClosed,
        }
    }

    /// Decode and composite off the async workers
    async fn compose(&self, bytes: Bytes) -> Option<CompositeImage> {
        let target = self.target;
        let style = self.style;
        let built = tokio::task::spawn_blocking(move || {
            let original = decode_image(&bytes)?;
            Ok::<_, AcquireError>(build_composite(&original, target, &style))
        })
        .await;

        match built {
            Ok(Ok(composite)) => Some(composite),
            Ok(Err(e)) => {
                warn!(display = %self.display, tick = self.seq, error = %e, "image decode failed");
                None
            }
            Err(e) => {
                warn!(display = %self.display, tick = self.seq, error = %e, "compositing task failed");
                None
            }
        }
    }

    fn enter(&self, phase: TickPhase) {
        self.phase.send_replace(phase);
        debug!(display = %self.display, tick = self.seq, ?phase, "tick phase");
    }
}
