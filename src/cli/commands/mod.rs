pub mod keys;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_WEB_ADDRESS: &str = "web-address";
pub const ARG_BASE_PATH: &str = "base-path";
pub const ARG_DSN: &str = "dsn";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("aurum")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_WEB_ADDRESS)
                .short('a')
                .long(ARG_WEB_ADDRESS)
                .help("Address to listen on")
                .default_value("0.0.0.0:8042")
                .env("WEB_ADDRESS")
                .value_parser(clap::value_parser!(std::net::SocketAddr)),
        )
        .arg(
            Arg::new(ARG_BASE_PATH)
                .long(ARG_BASE_PATH)
                .help("Path prefix every route is mounted under")
                .default_value("/")
                .env("BASE_PATH"),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Postgres connection string")
                .long_help(
                    "Postgres connection string. Without it users and groups are kept in memory and lost on restart.",
                )
                .env("DATABASE_URL")
                .hide_env_values(true),
        );

    let command = keys::with_args(command);
    logging::with_args(command)
}
