//! Logger initialization for the gateway binary.

use std::{str::FromStr, sync::Once};

use logforth::{append::Stderr, filter::EnvFilter};

static INIT: Once = Once::new();

/// Initialize the process logger. The filter accepts directives like
/// "info" or "gateway=debug,server=debug".
pub fn init(log_filter: &str) {
    INIT.call_once(|| {
        logforth::builder()
            .dispatch(|dispatch| {
                let filter = EnvFilter::from_str(log_filter)
                    .unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter should be valid"));

                dispatch.filter(filter).append(Stderr::default())
            })
            .apply();
    });
}
