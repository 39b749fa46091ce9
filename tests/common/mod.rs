use colored::Colorize;
use std::sync::Once;

static INIT: Once = Once::new();

/// One-time test process setup: logging plus the library's global
/// manager. Level comes from `TRACEBOX_LOG` (defaults to warn).
pub fn setup() {
    INIT.call_once(|| {
        let level = match std::env::var("TRACEBOX_LOG").as_ref().map(|s| s.as_str()) {
            Ok("trace") => log::LevelFilter::Trace,
            Ok("debug") => log::LevelFilter::Debug,
            Ok("info") => log::LevelFilter::Info,
            _ => log::LevelFilter::Warn,
        };
        let _ = fern::Dispatch::new()
            .format(|out, message, record| {
                let level = match record.level() {
                    log::Level::Error => "ERROR".red().to_string(),
                    log::Level::Warn => "WARN".yellow().to_string(),
                    log::Level::Info => "INFO".green().to_string(),
                    log::Level::Debug => "DEBUG".cyan().to_string(),
                    log::Level::Trace => "TRACE".normal().to_string(),
                };
                out.finish(format_args!(
                    "{} [{:<5}] {}",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    level,
                    message
                ))
            })
            .level(level)
            .chain(std::io::stderr())
            .apply();

        tracebox::init();
    });
}
