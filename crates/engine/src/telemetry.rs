//! Tracing setup for embedding binaries

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber. Call once at process start.
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing subscriber already installed, keeping existing one");
    }
}
