use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging.
///
/// Default level is INFO.
/// - `-v` => DEBUG
/// - `-vv` => TRACE
/// - `-q` => WARN
/// - `-qq` => ERROR
///
/// `RUST_LOG` overrides everything (e.g. `RUST_LOG=trace`).
pub fn init_logging(verbose: u8, quiet: u8) {
    let level = log_level(verbose, quiet);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,mapty={level}")));

    let show_src = matches!(level, "debug" | "trace");

    fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_file(show_src)
        .with_line_number(show_src)
        .compact()
        .init();
}

fn log_level(verbose: u8, quiet: u8) -> &'static str {
    let net = verbose as i16 - quiet as i16;
    match net {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        2..=i16::MAX => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_level() {
        assert_eq!(log_level(0, 0), "info");
        assert_eq!(log_level(1, 0), "debug");
        assert_eq!(log_level(5, 0), "trace");
        assert_eq!(log_level(0, 1), "warn");
        assert_eq!(log_level(1, 3), "error");
    }
}
