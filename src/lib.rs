pub mod backend; // REST client, token issuer, endpoints
pub mod booking;
pub mod config;
pub mod core_state; // Wiring shared by every view
pub mod dashboard;
pub mod export; // Prescription PDF
pub mod guard;
pub mod models;
pub mod navigation;
pub mod role;
pub mod session; // Identity session source + token bridge
pub mod storage;
pub mod validation;

#[cfg(test)]
pub mod testing;

use tracing_subscriber::EnvFilter;

pub use core_state::{CoreError, CoreState};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the default filter. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} client core v{}", config::APP_NAME, config::APP_VERSION);
    }
}
