//! Tracing setup, feature-gated so library consumers aren't forced to
//! take a subscriber dependency just by linking against `smjpeg`.

/// Install a `tracing-subscriber` `fmt` layer reading its filter from the
/// `SMJPEG_LOG` environment variable (falling back to `info`). Safe to
/// call more than once; later calls are no-ops.
#[cfg(feature = "logging")]
pub fn init() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("SMJPEG_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Without the `logging` feature this crate never pulls in a subscriber;
/// callers that skip this call simply see no `tracing` output, exactly
/// as if no subscriber were ever installed.
#[cfg(not(feature = "logging"))]
pub fn init() {}
