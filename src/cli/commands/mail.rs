use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("relay-interval")
                .long("relay-interval")
                .help("Seconds between notification relay sweeps")
                .env("PASSPORT_RELAY_INTERVAL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("mail-api-key")
                .long("mail-api-key")
                .help("Brevo API key; without it emails are only logged")
                .env("PASSPORT_MAIL_API_KEY")
                .hide_env_values(true)
                .requires("mail-sender"),
        )
        .arg(
            Arg::new("mail-sender")
                .long("mail-sender")
                .help("From address for outgoing email")
                .env("PASSPORT_MAIL_SENDER"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub relay_interval_seconds: u64,
    /// Set only when both the API key and sender are configured.
    pub brevo: Option<(SecretString, String)>,
}

impl Options {
    /// # Errors
    /// Returns an error if an API key is given without a sender.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let api_key = matches.get_one::<String>("mail-api-key").cloned();
        let sender = matches.get_one::<String>("mail-sender").cloned();
        let brevo = match (api_key, sender) {
            (Some(key), Some(sender)) => Some((SecretString::from(key), sender)),
            (Some(_), None) => return Err(anyhow!("missing required argument: --mail-sender")),
            (None, _) => None,
        };
        Ok(Self {
            relay_interval_seconds: matches
                .get_one::<u64>("relay-interval")
                .copied()
                .unwrap_or(5),
            brevo,
        })
    }
}
