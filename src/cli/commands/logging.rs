use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

/// How log lines are rendered on stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// `None` keeps the subscriber default (errors only).
    pub level: Option<Level>,
    pub format: LogFormat,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let verbosity = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
        let format = match matches.get_one::<String>(ARG_LOG_FORMAT).map(String::as_str) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self {
            level: level_for(verbosity),
            format,
        }
    }
}

const fn level_for(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Accepts a number (0-5) or a level name; both map onto the `-v` count.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        match level.parse::<u8>() {
            Ok(count) if count <= 5 => return Ok(count),
            _ => {}
        }

        ["error", "warn", "info", "debug", "trace"]
            .iter()
            .position(|name| name.eq_ignore_ascii_case(level))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level: {level}"))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PASSPORT_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Log output format")
                .env("PASSPORT_LOG_FORMAT")
                .value_parser(["pretty", "json"])
                .default_value("pretty"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        temp_env::with_vars(
            [
                ("PASSPORT_LOG_LEVEL", None::<&str>),
                ("PASSPORT_LOG_FORMAT", None),
            ],
            || Options::parse(&with_args(Command::new("passport")).get_matches_from(args)),
        )
    }

    #[test]
    fn maps_verbosity_counts() {
        assert_eq!(level_for(0), None);
        assert_eq!(level_for(1), Some(Level::WARN));
        assert_eq!(level_for(2), Some(Level::INFO));
        assert_eq!(level_for(3), Some(Level::DEBUG));
        assert_eq!(level_for(9), Some(Level::TRACE));
    }

    #[test]
    fn defaults_to_pretty_errors() {
        assert_eq!(
            parse(&["passport"]),
            Options {
                level: None,
                format: LogFormat::Pretty,
            }
        );
    }

    #[test]
    fn json_at_debug() {
        assert_eq!(
            parse(&["passport", "-vvv", "--log-format", "json"]),
            Options {
                level: Some(Level::DEBUG),
                format: LogFormat::Json,
            }
        );
    }

    #[test]
    fn rejects_unknown_format() {
        let result = temp_env::with_var("PASSPORT_LOG_FORMAT", None::<&str>, || {
            with_args(Command::new("passport")).try_get_matches_from(["passport", "--log-format", "xml"])
        });
        assert!(result.is_err());
    }
}
