//! Prints the stored form of a password, for seeding credential rows.
//!
//! $ cargo run --bin hash_password -- 'correct horse'
//! $ echo 'correct horse' | cargo run --bin hash_password

use clap::Parser;
use std::io::{self, BufRead};
use turnstile::application_impl::Argon2PasswordHasher;
use turnstile::application_port::CredentialHasher;

#[derive(Parser, Debug)]
struct Args {
    /// Read from stdin when omitted.
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let password = match args.password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        anyhow::bail!("empty password");
    }

    let hash = Argon2PasswordHasher::new().hash_password(&password).await?;
    println!("{hash}");
    Ok(())
}
