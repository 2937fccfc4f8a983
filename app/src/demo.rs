use log::{debug, info, trace};

use avatar_core::{AvatarSimulationService, HeadPose, PresentationCache, PresentationHost};

const REMOTE_LIFETIME_SEC: f32 = 5.0;
const WALK_SPEED: f32 = 1.4;
const BILLBOARD_PERIOD_SEC: f32 = 2.0;

#[derive(Debug, Clone)]
struct RemoteAvatar {
    id: u32,
    age_sec: f32,
    lifetime_sec: f32,
}

/// Stand-in avatar simulation: remote avatars come and go, the local one walks.
pub struct DemoCrowd {
    presentation: PresentationCache,
    others: Vec<RemoteAvatar>,
    next_id: u32,
    target_population: u32,

    distance_walked: f32,
    looking_at_hmd: bool,
    since_billboard: f32,
    ticks: u64,
}

impl DemoCrowd {
    pub fn new(presentation: PresentationCache, population: u32) -> Self {
        Self {
            presentation,
            others: Vec::with_capacity(population as usize),
            next_id: 0,
            target_population: population,
            distance_walked: 0.0,
            looking_at_hmd: false,
            since_billboard: 0.0,
            ticks: 0,
        }
    }

    fn spawn_remote(&mut self) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        // Stagger departures so the population churns.
        let lifetime_sec = REMOTE_LIFETIME_SEC + (id % 7) as f32 * 0.5;
        self.others.push(RemoteAvatar { id, age_sec: 0.0, lifetime_sec });
        trace!("remote avatar {id} joined");
    }
}

impl AvatarSimulationService for DemoCrowd {
    fn update_others(&mut self, delta_seconds: f32) {
        // The first tick's delta is measured from time zero.
        if self.ticks == 0 {
            debug!("ignoring first avatar delta ({delta_seconds:.3}s)");
        } else {
            for a in self.others.iter_mut() {
                a.age_sec += delta_seconds;
            }
        }

        let before = self.others.len();
        self.others.retain(|a| a.age_sec < a.lifetime_sec);
        let left = before - self.others.len();
        if left > 0 {
            trace!("{left} remote avatars left");
        }

        while (self.others.len() as u32) < self.target_population {
            self.spawn_remote();
        }
    }

    fn update_look_at_target(&mut self) {
        let hmd = self.presentation.is_hmd_mode();
        if hmd != self.looking_at_hmd {
            debug!("look-at source: {}", if hmd { "head pose" } else { "mouse" });
            self.looking_at_hmd = hmd;
        }
    }

    fn update_self(&mut self, delta_seconds: f32) {
        if self.ticks > 0 {
            self.distance_walked += WALK_SPEED * delta_seconds;
            self.since_billboard += delta_seconds;
        }
        if self.since_billboard >= BILLBOARD_PERIOD_SEC {
            self.since_billboard = 0.0;
            self.presentation.request_billboard_refresh();
        }
        self.ticks += 1;
    }
}

impl Drop for DemoCrowd {
    fn drop(&mut self) {
        info!(
            "crowd finished: ticks={} walked={:.1}m remotes_seen={}",
            self.ticks, self.distance_walked, self.next_id
        );
    }
}

/// Host-side display state. Toggles HMD mode every few seconds.
pub struct DemoDisplay {
    frame: u64,
    hmd_toggle_frames: u64,
    billboards: u32,
}

impl DemoDisplay {
    pub fn new(host_hz: u32) -> Self {
        Self {
            frame: 0,
            hmd_toggle_frames: u64::from(host_hz.max(1)) * 3,
            billboards: 0,
        }
    }

    #[inline]
    pub fn advance(&mut self) {
        self.frame += 1;
    }

    #[inline]
    pub fn billboards(&self) -> u32 {
        self.billboards
    }
}

impl PresentationHost for DemoDisplay {
    fn is_hmd_mode(&self) -> bool {
        (self.frame / self.hmd_toggle_frames) % 2 == 1
    }

    fn head_pose(&self) -> HeadPose {
        let mut pose = HeadPose::IDENTITY;
        // Small bob so the cached pose visibly changes.
        pose.matrix[13] = 1.7 + ((self.frame % 60) as f32 / 60.0) * 0.02;
        pose
    }

    fn refresh_billboard(&mut self) {
        self.billboards += 1;
        debug!("billboard refreshed ({})", self.billboards);
    }
}
