//! Produces secret hashes for the `accounts` section of the server config.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

mod cli_style;

use cli_style::get_styles;
use media_display_server::user::SecretHasher;

#[derive(Parser)]
#[command(styles = get_styles(), about = "Account secret tooling for media-display-server")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the hash of a secret.
    Hash {
        secret: String,

        /// argon2 or sha256. sha256 matches the SERVER_ADMIN_PASS format.
        #[clap(long, default_value = "argon2")]
        hasher: SecretHasher,
    },

    /// Prints a ready to paste `[[accounts]]` entry.
    Account {
        username: String,
        secret: String,

        #[clap(long, default_value = "argon2")]
        hasher: SecretHasher,
    },

    /// Checks a secret against a stored hash, the hasher is detected from the hash.
    Verify { secret: String, hash: String },
}

fn account_entry(username: &str, secret_hash: &str) -> String {
    format!(
        "[[accounts]]\nusername = {}\nsecret_hash = {}\n",
        toml::Value::String(username.to_string()),
        toml::Value::String(secret_hash.to_string())
    )
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    match cli_args.command {
        Command::Hash { secret, hasher } => {
            println!("{}", hasher.hash(&secret)?);
        }
        Command::Account {
            username,
            secret,
            hasher,
        } => {
            if username.is_empty() {
                bail!("Username cannot be empty");
            }
            print!("{}", account_entry(&username, &hasher.hash(&secret)?));
        }
        Command::Verify { secret, hash } => {
            let hasher = SecretHasher::detect(&hash);
            if hasher.verify(&secret, &hash)? {
                println!("OK ({})", hasher);
            } else {
                bail!("Secret does not match ({})", hasher);
            }
        }
    }
    Ok(())
}
