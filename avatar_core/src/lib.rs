//! Avatar update core.
//!
//! Per-frame avatar simulation scheduling for the world client: either driven
//! by the host's frame loop or by a dedicated, self-paced update thread.

pub mod config;
pub mod error;
pub mod presentation;
pub mod scheduler;
pub mod service;
pub mod signals;
pub mod state;
pub mod telemetry;
pub mod time;

pub use config::{load_config_toml, AppConfig, RunConfig, UpdateConfig, UpdateMode};
pub use error::{UpdateError, UpdateResult};
pub use presentation::{HeadPose, PresentationCache, PresentationSnapshot};
pub use scheduler::{AvatarUpdateScheduler, UPDATE_THREAD_NAME};
pub use service::{AvatarSimulationService, PresentationHost, RateSink};
pub use signals::StopSignal;
pub use state::RunState;
pub use telemetry::SimrateTelemetry;
pub use time::{FramePacer, SystemPacer};
