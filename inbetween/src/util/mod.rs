use std::time::Instant;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Install the fmt subscriber; RUST_LOG overrides the default filter
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

// Log the time since `st` when timing output is enabled
pub fn log_timing(enabled: bool, st: Instant, msg: &str) {
    if enabled {
        let took = Instant::now().duration_since(st);
        info!("{msg} took: {}ms", took.as_millis());
    }
}

// Last `max` characters of `s`, on a char boundary
pub fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    s.chars().skip(count - max).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("ああいう", 2), "いう");
    }
}
