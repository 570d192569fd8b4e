use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("private-key")
                .long("private-key")
                .help("Path to the RSA private key used to sign tokens (PEM or DER, PKCS#8 or PKCS#1)")
                .env("PASSPORT_PRIVATE_KEY")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("public-key")
                .long("public-key")
                .help("Path to the matching RSA public key, published as the JWKS")
                .env("PASSPORT_PUBLIC_KEY")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl Options {
    /// # Errors
    /// Returns an error if either key path is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            private_key: matches
                .get_one::<PathBuf>("private-key")
                .cloned()
                .context("missing required argument: --private-key")?,
            public_key: matches
                .get_one::<PathBuf>("public-key")
                .cloned()
                .context("missing required argument: --public-key")?,
        })
    }
}
