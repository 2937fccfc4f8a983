use env_logger::{Builder, WriteStyle};
use log::{LevelFilter, SetLoggerError};

use std::io::Write;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static BOOT: OnceLock<Instant> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLoggerConfig {
    pub level: LevelFilter,
    pub colors: bool,
    pub include_module: bool,
}

impl ConsoleLoggerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup("AVATAR_LOG")
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);
        let colors = lookup("AVATAR_LOG_COLORS")
            .map(|v| v != "0")
            .unwrap_or(true);
        let include_module = lookup("AVATAR_LOG_MODULE")
            .map(|v| v != "0")
            .unwrap_or(true);

        Self {
            level,
            colors,
            include_module,
        }
    }
}

impl Default for ConsoleLoggerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Installs the process-wide console logger.
///
/// Line format: `[+mm:ss.mmm] [LEVEL] target message`.
pub struct ConsoleLogger;

impl ConsoleLogger {
    /// Fails if another logger is already installed.
    pub fn install(config: ConsoleLoggerConfig) -> Result<(), SetLoggerError> {
        BOOT.get_or_init(Instant::now);

        let mut builder = Builder::new();
        builder.filter_level(config.level);
        builder.write_style(if config.colors {
            WriteStyle::Auto
        } else {
            WriteStyle::Never
        });

        let include_module = config.include_module;
        builder.format(move |buf, record| {
            let boot = *BOOT.get_or_init(Instant::now);
            let stamp = fmt_uptime(boot.elapsed());
            let style = buf.default_level_style(record.level());

            if include_module {
                writeln!(
                    buf,
                    "[{stamp}] [{style}{:<5}{style:#}] {:<20} {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "[{stamp}] [{style}{:<5}{style:#}] {}",
                    record.level(),
                    record.args()
                )
            }
        });

        builder.try_init()
    }

    /// Installs from environment; a second call is a no-op.
    pub fn install_from_env() {
        let _ = Self::install(ConsoleLoggerConfig::from_env());
    }
}

/// mm:ss.mmm, or hh:mm:ss.mmm past the first hour.
fn fmt_uptime(d: Duration) -> String {
    let total_ms = d.as_millis() as u64;

    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;

    let s = total_s % 60;
    let total_m = total_s / 60;

    let m = total_m % 60;
    let h = total_m / 60;

    if h > 0 {
        format!("+{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
    } else {
        format!("+{:02}:{:02}.{:03}", m, s, ms)
    }
}
