use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Crates whose own logging drowns out ours at debug level.
const QUIET_TARGETS: [&str; 3] = ["fjall", "lsm_tree", "hyper_util"];

/// Logs `shopper` events to stderr: warnings by default, everything down to
/// debug with `verbose`. `RUST_LOG` narrows or widens this further.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let targets = QUIET_TARGETS
        .iter()
        .fold(Targets::new().with_target("shopper", level), |t, name| {
            t.with_target(*name, LevelFilter::WARN)
        });
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .without_time()
                .with_target(verbose)
                .with_writer(std::io::stderr),
        )
        .with(targets)
        .with(env_filter);

    // A second init, e.g. from a test harness, keeps the first subscriber.
    let _ = subscriber.try_init();
}
