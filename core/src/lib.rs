pub mod acquire;
pub mod blur;
pub mod composite;
pub mod geometry;
pub mod refresh;
pub mod settings;
pub mod surface;

// Re-exports for convenience
pub use acquire::{AcquireError, AcquisitionClient, HttpTransport, Transport};
pub use blur::BlurParams;
pub use composite::{CompositeImage, CompositeStyle, RawImage, build_composite};
pub use geometry::{DisplayRegion, Placement, Size};
pub use refresh::{RefreshController, TickOutcome, TickPhase};
pub use settings::{ScheduleSettings, Settings, SourceSettings, SurfaceSettings};
pub use surface::{OverlaySurface, Presenter};
