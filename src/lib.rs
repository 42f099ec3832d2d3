//! Prescription intake and patient linking.
//!
//! Photographed prescriptions are uploaded to a recognition service, staged
//! per intake session, then linked to a patient as one prescription record per
//! image with one drug record per recognised drug. A patient's drug history is
//! rebuilt by joining their prescriptions with the drug records under each.

pub mod config;
pub mod core_state;
pub mod fanout;
pub mod history;
pub mod images;
pub mod models;
pub mod patients;
pub mod pipeline;
pub mod store;

pub use core_state::CoreState;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over the default filter.
/// Calling it again once a subscriber is set does nothing.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}
