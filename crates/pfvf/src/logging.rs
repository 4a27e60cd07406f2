use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
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

/// Per-crate filter. The transport logs every register write and ack at
/// debug, so it only goes past info when trace is asked for.
fn targets(level: LogLevel) -> Targets {
    let max = level.as_filter();
    let transport = if level == LogLevel::Trace {
        max
    } else {
        max.min(LevelFilter::INFO)
    };
    Targets::new()
        .with_target("pfvf_transport", transport)
        .with_default(max)
}

/// Install the stderr subscriber. Stdout carries command output only.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(targets(level));

    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn transport_debug_needs_trace() {
        let debug = targets(LogLevel::Debug);
        assert!(debug.would_enable("pfvf_proto::vf", &Level::DEBUG));
        assert!(debug.would_enable("pfvf_transport::csr", &Level::INFO));
        assert!(!debug.would_enable("pfvf_transport::csr", &Level::DEBUG));

        let trace = targets(LogLevel::Trace);
        assert!(trace.would_enable("pfvf_transport::csr", &Level::DEBUG));
    }

    #[test]
    fn warn_hides_info_everywhere() {
        let warn = targets(LogLevel::Warn);
        assert!(warn.would_enable("pfvf_blkmsg::fetch", &Level::ERROR));
        assert!(!warn.would_enable("pfvf_proto::pf", &Level::INFO));
    }
}
