use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::warn;

/// Cooperative stop flag shared between a loop and whoever wants it to end.
///
/// Observed only at iteration boundaries; it never interrupts work in flight.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)) }
    }

    #[inline]
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Routes Ctrl-C / SIGTERM into this signal. Only one handler per process.
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let s = self.clone();
        ctrlc::set_handler(move || {
            warn!("termination signal received");
            s.request_stop();
        })
    }
}
