//! Map parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{admin::BootstrapAdmin, keys, mail};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let keys = keys::Options::parse(matches)?;
    let mail = mail::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one::<String>("dsn").cloned(),
        public_url: matches
            .get_one::<String>("public-url")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8080".to_string()),
        private_key: keys.private_key,
        public_key: keys.public_key,
        relay_interval_seconds: mail.relay_interval_seconds,
        brevo: mail.brevo,
        admin: BootstrapAdmin::parse(matches)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::path::PathBuf;

    #[test]
    fn builds_server_args() {
        temp_env::with_vars(
            [
                ("PASSPORT_DSN", None::<&str>),
                ("PASSPORT_PRIVATE_KEY", Some("/keys/private.pem")),
                ("PASSPORT_PUBLIC_KEY", Some("/keys/public.pem")),
                ("PASSPORT_MAIL_API_KEY", Some("xkeysib-123")),
                ("PASSPORT_MAIL_SENDER", Some("noreply@example.com")),
                ("PASSPORT_ADMIN_USERNAME", None),
                ("PASSPORT_RELAY_INTERVAL_SECONDS", Some("0")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["passport"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.dsn, None);
                    assert_eq!(args.private_key, PathBuf::from("/keys/private.pem"));
                    assert_eq!(args.relay_interval_seconds, 0);
                    assert!(args.admin.is_none());
                    let brevo = args.brevo.map(|(key, sender)| {
                        (key.expose_secret().to_string(), sender)
                    });
                    assert_eq!(
                        brevo,
                        Some(("xkeysib-123".to_string(), "noreply@example.com".to_string()))
                    );
                }
            },
        );
    }
}
