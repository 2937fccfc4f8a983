use std::time::Duration;

use crate::presentation::HeadPose;

/// Simulation of the remote avatars and the local one.
///
/// Called from exactly one thread at a time: the one running `step()`.
/// Implementations handle their own failures; nothing propagates back.
pub trait AvatarSimulationService: Send {
    /// Simulates every remote avatar, refreshes look-at data, drops avatars that left.
    fn update_others(&mut self, delta_seconds: f32);

    /// Points the local avatar's eyes at whatever it should be looking at.
    fn update_look_at_target(&mut self);

    /// Samples input, advances the local avatar and sends its state out.
    fn update_self(&mut self, delta_seconds: f32);
}

/// Observability sink for the avatar step.
///
/// Both calls are best-effort and must never block the step.
pub trait RateSink: Send + Sync {
    fn report_rate(&self, ticks_per_second: f32);

    fn record_step(&self, _elapsed: Duration) {}
}

/// Host-thread state the auxiliary step caches for asynchronous readers.
pub trait PresentationHost {
    fn is_hmd_mode(&self) -> bool;
    fn head_pose(&self) -> HeadPose;
    /// Rebuilds the local avatar's cached billboard image.
    fn refresh_billboard(&mut self);
}
