use crate::keys::{DEFAULT_PUBLIC_KEY_PATH, DEFAULT_SECRET_KEY_PATH};
use clap::{builder::BoolishValueParser, Arg, ArgAction, Command};

pub const ARG_PUBLIC_KEY: &str = "public-key";
pub const ARG_SECRET_KEY: &str = "secret-key";
pub const ARG_PUBLIC_KEY_PATH: &str = "public-key-path";
pub const ARG_SECRET_KEY_PATH: &str = "secret-key-path";
pub const ARG_NO_KEY_GENERATE: &str = "no-key-generate";
pub const ARG_NO_KEY_WRITE: &str = "no-key-write";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PUBLIC_KEY)
                .long(ARG_PUBLIC_KEY)
                .help("Ed25519 public key as PEM")
                .env("PUBLIC_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SECRET_KEY)
                .long(ARG_SECRET_KEY)
                .help("Ed25519 secret key as PKCS#8 PEM")
                .env("SECRET_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_PUBLIC_KEY_PATH)
                .long(ARG_PUBLIC_KEY_PATH)
                .help("Public key file, read if present and written after generation")
                .env("PUBLIC_KEY_PATH")
                .default_value(DEFAULT_PUBLIC_KEY_PATH),
        )
        .arg(
            Arg::new(ARG_SECRET_KEY_PATH)
                .long(ARG_SECRET_KEY_PATH)
                .help("Secret key file, read if present and written after generation")
                .env("SECRET_KEY_PATH")
                .default_value(DEFAULT_SECRET_KEY_PATH),
        )
        .arg(
            Arg::new(ARG_NO_KEY_GENERATE)
                .long(ARG_NO_KEY_GENERATE)
                .help("Fail instead of generating a keypair when none is configured")
                .env("NO_KEY_GENERATE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_NO_KEY_WRITE)
                .long(ARG_NO_KEY_WRITE)
                .help("Keep a generated keypair in memory only")
                .env("NO_KEY_WRITE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
