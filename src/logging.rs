use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static VERBOSE: AtomicBool = AtomicBool::new(false);
static INIT: Once = Once::new();

/// Install the global tracing subscriber. Only the first call has any effect.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `info` when verbose
/// and `warn` when not.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        VERBOSE.store(verbose, Ordering::Relaxed);
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "karuisearch=info"
    } else {
        "karuisearch=warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_init_wins() {
        init(true);
        init(false);
        assert!(is_verbose());
        assert_eq!(default_directive(false), "karuisearch=warn");
    }
}
