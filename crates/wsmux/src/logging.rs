use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Extra filter directives, e.g. `WSMUX_LOG=wsmux_peer=trace`.
const LOG_DIRECTIVES_ENV: &str = "WSMUX_LOG";

/// Crates that only get to log warnings unless `--log-level trace` is set.
const QUIET_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `level` for everything, the WebSocket stack held at warn below trace, then
/// whatever `WSMUX_LOG` adds. Directives from the environment win.
fn build_filter(level: LogLevel, directives: Option<&str>) -> EnvFilter {
    let mut filter = EnvFilter::builder()
        .with_default_directive(level.as_filter().into())
        .parse_lossy("");
    if !matches!(level, LogLevel::Trace) {
        for target in QUIET_TARGETS {
            if let Ok(directive) = format!("{target}=warn").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    for raw in directives.unwrap_or_default().split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match raw.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(err) => eprintln!("warning: ignoring {LOG_DIRECTIVES_ENV} directive {raw:?}: {err}"),
        }
    }
    filter
}

/// Install the stderr subscriber. Protocol traffic is logged at trace level
/// under the `wsmux_peer` target, so `WSMUX_LOG=wsmux_peer=trace` shows every
/// message without the rest of the stack.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_DIRECTIVES_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, directives.as_deref()))
        .with_ansi(false)
        .with_target(matches!(level, LogLevel::Debug | LogLevel::Trace));

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
