use color_eyre::{eyre::eyre, Report};
use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt::format::FmtSpan, EnvFilter};

/// Default filtering directive for this crate's own events.
const DEFAULT_DIRECTIVE: &str = "grip=debug";

/// Attaches a tracing subscriber to the application, writing to stderr so
/// that stdout only carries signal messages.
///
/// `RUST_LOG` is honoured; the crate's own events default to `debug`.
pub fn attach_tracing_logger() -> Result<(), Report> {
    let default_level: Directive = Level::INFO.into();
    let filtering_directive = DEFAULT_DIRECTIVE.parse().unwrap_or_else(|err| {
        eprintln!("using INFO level due to invalid filter directive: {err:?}");
        default_level
    });

    let tracing_filter = EnvFilter::from_default_env().add_directive(filtering_directive);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| eyre!("failed to install tracing subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_is_valid() {
        assert!(DEFAULT_DIRECTIVE.parse::<Directive>().is_ok());
    }
}
