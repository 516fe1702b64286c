use backup_receiver::services::auth::hash_password;
use backup_receiver::utils::validation::is_password_allowed;
use dotenvy::dotenv;
use std::env;
use std::io::BufRead;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Logs go to stderr so stdout carries only the hash
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hash_password=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let password = match env::var("BACKUP_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            info!("BACKUP_PASSWORD not set, reading password from stdin");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    let password = password.trim();

    if !is_password_allowed(password) {
        error!(
            "Password must be longer than 16 characters and use only A-Z, a-z, 0-9, '+', '/' and '='"
        );
        std::process::exit(1);
    }

    let hash = hash_password(password).map_err(|e| anyhow::anyhow!("hashing failed: {}", e))?;
    info!("Set PASSWORD_HASH to the line below");
    println!("{}", hash);

    Ok(())
}
