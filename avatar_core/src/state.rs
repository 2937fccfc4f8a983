use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

/// Lifecycle of the avatar update scheduler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Terminating = 2,
    Terminated = 3,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Terminating => "Terminating",
            RunState::Terminated => "Terminated",
        }
    }

    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunState::Idle,
            1 => RunState::Running,
            2 => RunState::Terminating,
            _ => RunState::Terminated,
        }
    }
}

/// `RunState` readable from any thread.
#[derive(Clone, Debug)]
pub(crate) struct SharedRunState {
    v: Arc<AtomicU8>,
}

impl SharedRunState {
    #[inline]
    pub(crate) fn new(state: RunState) -> Self {
        Self { v: Arc::new(AtomicU8::new(state as u8)) }
    }

    #[inline]
    pub(crate) fn get(&self) -> RunState {
        RunState::from_u8(self.v.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set(&self, state: RunState) {
        self.v.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_state() {
        let s = SharedRunState::new(RunState::Idle);
        for st in [RunState::Running, RunState::Terminating, RunState::Terminated, RunState::Idle] {
            s.set(st);
            assert_eq!(s.get(), st);
            assert_eq!(s.clone().get().as_str(), st.as_str());
        }
    }
}
