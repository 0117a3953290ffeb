pub mod cli;
pub mod config;
pub mod corpus;
pub mod loader;
pub mod nav;
pub mod render;
pub mod session;
pub mod stats;
pub mod style;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logs go to stderr so they don't interleave with frames on stdout.
pub fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => tracing_subscriber::filter::LevelFilter::WARN,
        1 => tracing_subscriber::filter::LevelFilter::INFO,
        _ => tracing_subscriber::filter::LevelFilter::DEBUG,
    };
    let format = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or(tracing_subscriber::EnvFilter::default().add_directive(default_level.into()));

    tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .init();
}
