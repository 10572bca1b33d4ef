use tracing_subscriber::{fmt, EnvFilter};

/// Env var that raises the default level to debug when `RUST_LOG` is unset.
pub const DEBUG_ENV: &str = "COMMAND_BAR_DEBUG";

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "command_bar=debug,info"
    } else {
        "info"
    }
}

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_directive(std::env::var_os(DEBUG_ENV).is_some()))
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("command_bar=debug"));
    }
}
