//! Tracing subscriber setup.

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `config.level`; an unparsable level falls back to
/// `info`. Returns `false` if a subscriber was already installed.
pub fn init_tracing(config: &LogConfig) -> bool {
    install(config, std::io::stderr)
}

fn install<W>(config: &LogConfig, writer: W) -> bool
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
