//! Logging and tracing infrastructure for motemem.
//!
//! Hosts call one of the init functions once; library code only emits
//! `tracing` events and spans.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

/// Library events at info, everything else at warn, unless `RUST_LOG` says
/// otherwise.
fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,motemem=info"))
}

/// Install a human-readable subscriber. Only the first call of either init
/// function has an effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true);

        // A host may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(default_filter())
            .with(fmt_layer)
            .try_init();

        info!("motemem tracing initialized");
    });
}

/// Install a JSON subscriber, for hosts that ship logs to a collector.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true);

        let _ = tracing_subscriber::registry()
            .with(default_filter())
            .with(fmt_layer)
            .try_init();

        info!("motemem tracing initialized (JSON mode)");
    });
}

/// Macro for creating spans around a module-level operation
#[macro_export]
macro_rules! span_trace {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Macro for logging and returning errors
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::error!(error = %e, "Operation failed");
        e
    }};
    ($err:expr, $msg:expr) => {{
        let e = $err;
        tracing::error!(error = %e, message = $msg, "Operation failed");
        e
    }};
}
