use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("admin-username")
                .long("admin-username")
                .help("Bootstrap admin username, created at startup if absent")
                .env("PASSPORT_ADMIN_USERNAME")
                .requires_all(["admin-email", "admin-password"]),
        )
        .arg(
            Arg::new("admin-email")
                .long("admin-email")
                .help("Bootstrap admin email")
                .env("PASSPORT_ADMIN_EMAIL")
                .requires("admin-username"),
        )
        .arg(
            Arg::new("admin-password")
                .long("admin-password")
                .help("Bootstrap admin password")
                .env("PASSPORT_ADMIN_PASSWORD")
                .hide_env_values(true)
                .requires("admin-username"),
        )
}

#[derive(Debug)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: SecretString,
}

impl BootstrapAdmin {
    /// # Errors
    /// Returns an error if the admin username is set without an email or password.
    pub fn parse(matches: &ArgMatches) -> Result<Option<Self>> {
        let Some(username) = matches.get_one::<String>("admin-username").cloned() else {
            return Ok(None);
        };
        Ok(Some(Self {
            username,
            email: matches
                .get_one::<String>("admin-email")
                .cloned()
                .context("missing required argument: --admin-email")?,
            password: matches
                .get_one::<String>("admin-password")
                .cloned()
                .map(SecretString::from)
                .context("missing required argument: --admin-password")?,
        }))
    }
}
