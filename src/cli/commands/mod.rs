pub mod admin;
pub mod keys;
pub mod logging;
pub mod mail;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!(
            "{} - {}",
            env!("CARGO_PKG_VERSION"),
            crate::passport::GIT_COMMIT_HASH
        )
        .into_boxed_str(),
    );

    let command = Command::new("passport")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PASSPORT_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .long_help(
                    "Postgres connection string. Without it everything is kept in memory and lost on exit.",
                )
                .env("PASSPORT_DSN"),
        )
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .help("Public base URL used in verification links")
                .env("PASSPORT_PUBLIC_URL")
                .default_value("http://localhost:8080"),
        );

    let command = keys::with_args(command);
    let command = mail::with_args(command);
    let command = admin::with_args(command);
    logging::with_args(command)
}
