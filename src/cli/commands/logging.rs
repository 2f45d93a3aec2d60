use clap::{Arg, ArgAction, ArgMatches, Command, builder::ValueParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Names accepted by `BALLOT_LOG_LEVEL`, indexed by verbosity count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn parse_level(value: &str) -> Result<u8, String> {
    let value = value.trim().to_lowercase();
    let index = value
        .parse::<usize>()
        .ok()
        .filter(|index| *index < LEVEL_NAMES.len())
        .or_else(|| LEVEL_NAMES.iter().position(|name| *name == value));

    index.and_then(|index| u8::try_from(index).ok()).ok_or_else(|| {
        format!(
            "unknown log level '{value}', expected one of: {}",
            LEVEL_NAMES.join(", ")
        )
    })
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Raise log verbosity; -vv logs each code request and verification")
            .long_help(
                "Repeat to raise verbosity: -v WARN, -vv INFO, -vvv DEBUG, -vvvv TRACE. \
                 Errors are always logged. Emails in log lines are masked.",
            )
            .env("BALLOT_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

/// Tracing level for the parsed verbosity. `None` keeps the ERROR default.
#[must_use]
pub fn level(matches: &ArgMatches) -> Option<Level> {
    match matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0) {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_and_counts() {
        assert_eq!(parse_level("error"), Ok(0));
        assert_eq!(parse_level(" Debug "), Ok(3));
        assert_eq!(parse_level("4"), Ok(4));
        assert!(parse_level("5").is_err());
        assert_eq!(
            parse_level("loud"),
            Err("unknown log level 'loud', expected one of: error, warn, info, debug, trace"
                .to_string())
        );
    }

    #[test]
    fn count_maps_to_tracing_level() {
        let command = with_args(Command::new("ballot"));
        let cases = [
            (vec!["ballot"], None),
            (vec!["ballot", "-v"], Some(Level::WARN)),
            (vec!["ballot", "-vv"], Some(Level::INFO)),
            (vec!["ballot", "-vvv"], Some(Level::DEBUG)),
            (vec!["ballot", "-vvvvvv"], Some(Level::TRACE)),
        ];
        temp_env::with_var_unset("BALLOT_LOG_LEVEL", || {
            for (args, expected) in cases {
                let matches = command.clone().get_matches_from(args);
                assert_eq!(level(&matches), expected);
            }
        });
    }
}
