use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::RwLock;

use crate::service::PresentationHost;

/// Head pose reported by the active display, column-major 4x4.
///
/// Carried opaquely; the update core never does math on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub matrix: [f32; 16],
}

impl HeadPose {
    pub const IDENTITY: HeadPose = HeadPose {
        matrix: [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ],
    };
}

impl Default for HeadPose {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Last values published by the auxiliary step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PresentationSnapshot {
    pub hmd_mode: bool,
    pub head_pose: HeadPose,
    /// Number of auxiliary steps that have published so far.
    pub refresh_count: u64,
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: RwLock<PresentationSnapshot>,
    billboard_requested: AtomicBool,
}

/// Thread-safe handle to the cached presentation state.
///
/// Written on the host thread by `synchronous_auxiliary_step`, read by the
/// simulation (which may live on the background thread).
#[derive(Debug, Clone, Default)]
pub struct PresentationCache {
    shared: Arc<Shared>,
}

impl PresentationCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn snapshot(&self) -> PresentationSnapshot {
        *self.shared.snapshot.read()
    }

    #[inline]
    pub fn is_hmd_mode(&self) -> bool {
        self.shared.snapshot.read().hmd_mode
    }

    #[inline]
    pub fn head_pose(&self) -> HeadPose {
        self.shared.snapshot.read().head_pose
    }

    /// Asks the next auxiliary step to rebuild the billboard once. Callable from any thread.
    #[inline]
    pub fn request_billboard_refresh(&self) {
        self.shared.billboard_requested.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_billboard_refresh_pending(&self) -> bool {
        self.shared.billboard_requested.load(Ordering::Acquire)
    }

    pub(crate) fn publish(&self, hmd_mode: bool, head_pose: HeadPose) {
        let mut snap = self.shared.snapshot.write();
        snap.hmd_mode = hmd_mode;
        snap.head_pose = head_pose;
        snap.refresh_count = snap.refresh_count.wrapping_add(1);
    }

    #[inline]
    pub(crate) fn take_billboard_request(&self) -> bool {
        self.shared.billboard_requested.swap(false, Ordering::AcqRel)
    }

    /// Pulls fresh state from the host and serves a pending billboard request.
    pub(crate) fn refresh_from(&self, host: &mut dyn PresentationHost) {
        self.publish(host.is_hmd_mode(), host.head_pose());
        if self.take_billboard_request() {
            host.refresh_billboard();
        }
    }
}
