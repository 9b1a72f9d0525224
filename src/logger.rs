use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset. Verbose runs also show the HTTP client's requests.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "s2_composite=debug,reqwest=debug,warn"
    } else {
        "s2_composite=info,warn"
    }
}

/// Logs to stderr so the terminal output never mixes with anything written to stdout.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for verbose in [false, true] {
            let directives = default_directives(verbose);
            assert!(directives.starts_with("s2_composite="));
            assert!(EnvFilter::try_new(directives).is_ok());
        }
    }
}
