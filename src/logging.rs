use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console logging on stderr so stdout stays free for command output.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose {
        "recruiter_kpi=debug"
    } else {
        "recruiter_kpi=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // A second install in the same process is a no-op.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
