use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;
use clap::parser::ValueSource;

/// Map an `AURUM_LOG_LEVEL` value (0 = ERROR .. 4 = TRACE) to a tracing level
const fn get_verbosity_level(verbosity: u8) -> tracing::Level {
    match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Map repeated `-v` flags to a tracing level, counting up from INFO
const fn get_flag_level(count: u8) -> tracing::Level {
    match count {
        0 | 1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Level asked for on the command line or in the environment, if any.
fn requested_level(matches: &clap::ArgMatches) -> Option<tracing::Level> {
    let value = matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .copied()?;
    match matches.value_source(commands::logging::ARG_VERBOSITY) {
        Some(ValueSource::CommandLine) => Some(get_flag_level(value)),
        Some(ValueSource::EnvVariable) => Some(get_verbosity_level(value)),
        _ => None,
    }
}

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if telemetry initialization or action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(
        requested_level(&matches),
        matches.get_flag(commands::logging::ARG_LOG_JSON),
    )?;

    dispatch::handler(&matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(get_verbosity_level(0), Level::ERROR);
        assert_eq!(get_verbosity_level(2), Level::INFO);
        assert_eq!(get_verbosity_level(9), Level::TRACE);
    }

    #[test]
    fn test_flag_levels() {
        assert_eq!(get_flag_level(1), Level::INFO);
        assert_eq!(get_flag_level(2), Level::DEBUG);
        assert_eq!(get_flag_level(3), Level::TRACE);
    }

    #[test]
    fn test_requested_level() {
        temp_env::with_var("AURUM_LOG_LEVEL", None::<&str>, || {
            let matches = commands::new().get_matches_from(vec!["aurum"]);
            assert_eq!(requested_level(&matches), None);

            let matches = commands::new().get_matches_from(vec!["aurum", "-vv"]);
            assert_eq!(requested_level(&matches), Some(Level::DEBUG));
        });
        temp_env::with_var("AURUM_LOG_LEVEL", Some("error"), || {
            let matches = commands::new().get_matches_from(vec!["aurum"]);
            assert_eq!(requested_level(&matches), Some(Level::ERROR));
        });
    }

    #[test]
    fn test_verbose_flag_never_quieter_than_default() {
        temp_env::with_var("AURUM_LOG_LEVEL", None::<&str>, || {
            // the first-run admin password is logged at INFO
            for args in [vec!["aurum", "-v"], vec!["aurum", "-vv"], vec!["aurum", "-vvvv"]] {
                let matches = commands::new().get_matches_from(args);
                let level = requested_level(&matches).unwrap_or(Level::INFO);
                assert!(level >= Level::INFO, "{level} hides INFO");
            }
        });
    }
}
