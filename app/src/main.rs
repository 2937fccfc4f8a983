mod demo;

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use log::{info, warn};

use avatar_core::{
    load_config_toml, time::target_interval_usec, AppConfig, AvatarUpdateScheduler,
    PresentationCache, RunConfig, SimrateTelemetry, StopSignal, SystemPacer, UpdateMode,
};
use avatar_logging::ConsoleLogger;

use demo::{DemoCrowd, DemoDisplay};

/// Host frame period for the demo loop.
fn host_frame_interval(run: &RunConfig) -> anyhow::Result<Duration> {
    let usec = target_interval_usec(run.host_hz)
        .with_context(|| format!("run.host_hz must be above zero (got {})", run.host_hz))?;
    Ok(Duration::from_micros(usec))
}

fn main() -> anyhow::Result<()> {
    ConsoleLogger::install_from_env();

    let cfg = match std::env::args().nth(1) {
        Some(path) => load_config_toml(&path).with_context(|| format!("loading {path}"))?,
        None => AppConfig::default(),
    };
    let frame = host_frame_interval(&cfg.run)?;

    let exit = StopSignal::new();
    if let Err(e) = exit.install_ctrlc_handler() {
        warn!("no Ctrl-C handler: {e}");
    }

    let telemetry = Arc::new(SimrateTelemetry::from_period_ms(cfg.update.telemetry_period_ms));
    let presentation = PresentationCache::new();
    let crowd = DemoCrowd::new(presentation.clone(), cfg.run.remote_avatars);

    let mut scheduler =
        AvatarUpdateScheduler::new(&cfg.update, Box::new(crowd), Box::new(SystemPacer::new()))?
            .with_rate_sink(telemetry.clone())
            .with_presentation(presentation);

    scheduler.start(cfg.update.update_type == UpdateMode::Threaded)?;
    info!(
        "avatar update running: mode={} threaded={} interval={}us",
        scheduler.mode(),
        scheduler.is_threaded(),
        scheduler.target_interval_usec()
    );

    let run_for = cfg.run.run_for_ms.map(Duration::from_millis);
    let mut display = DemoDisplay::new(cfg.run.host_hz);
    let started = Instant::now();

    loop {
        if exit.is_stop_requested() {
            break;
        }
        if run_for.is_some_and(|d| started.elapsed() >= d) {
            break;
        }

        let t0 = Instant::now();

        if !scheduler.is_threaded() {
            scheduler.step();
        }
        scheduler.synchronous_auxiliary_step(&mut display);
        display.advance();

        thread::sleep(frame.saturating_sub(t0.elapsed()));
    }

    scheduler.stop();
    info!(
        "shutdown: state={} avg_simrate={:.1} billboards={}",
        scheduler.run_state().as_str(),
        telemetry.average_rate(),
        display.billboards()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_frame_interval_follows_host_hz() {
        let run = RunConfig::default();
        assert_eq!(host_frame_interval(&run).unwrap(), Duration::from_micros(16_667));
    }

    #[test]
    fn zero_host_hz_names_the_setting() {
        let run = RunConfig { host_hz: 0, ..RunConfig::default() };
        let err = host_frame_interval(&run).unwrap_err();
        assert!(format!("{err:#}").contains("run.host_hz"), "{err:#}");
    }
}
