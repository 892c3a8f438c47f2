//! Decidr CLI: admin and client endpoints, a local demo, key generation.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use decidr_cli::{keyfile, AdminEndpoint, ClientEndpoint, ExchangeReport};
use decidr_crypto::{
    generate_static_keypair, CancellationToken, Handshake, HashFunction, NoiseConfig,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "decidr")]
#[command(about = "Decidr end-to-end encrypted admin/client channel")]
struct Args {
    /// Relay base URL
    #[arg(long, global = true, env = "DECIDR_RELAY_URL", default_value = "ws://127.0.0.1:8080")]
    relay: String,

    /// Handshake hash function
    #[arg(long, global = true, value_enum, default_value_t = Hash::Sha256)]
    hash: Hash,

    /// Log level
    #[arg(long, global = true, env = "DECIDR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve one client as Admin
    Admin {
        /// Admin id on the relay
        #[arg(long, default_value = "admin-1")]
        id: String,

        /// Client to serve
        #[arg(long, default_value = "client-1")]
        client: String,

        /// Reply sent after the client's message
        #[arg(long, default_value = "hello client")]
        reply: String,

        /// Private key file from `keygen` (fresh key when omitted)
        #[arg(long, env = "DECIDR_ADMIN_KEY")]
        key: Option<PathBuf>,
    },

    /// Connect to an Admin as Client
    Client {
        /// Client id on the relay
        #[arg(long, default_value = "client-1")]
        id: String,

        /// Admin to talk to
        #[arg(long, default_value = "admin-1")]
        admin: String,

        /// Expected Admin public key (hex)
        #[arg(long)]
        admin_key: Option<String>,

        /// Message sent after the handshake
        #[arg(long, default_value = "hello admin")]
        message: String,
    },

    /// Run an Admin and a Client against the relay in one process
    Demo {
        #[arg(long, default_value = "admin-1")]
        admin: String,

        #[arg(long, default_value = "client-1")]
        client: String,
    },

    /// Generate an Admin static keypair and save it to disk
    Keygen {
        /// Private key file; the public key goes next to it as `.pub`
        #[arg(long, short, default_value = "decidr-admin.key")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Hash {
    Sha256,
    Blake2s,
}

impl From<Hash> for HashFunction {
    fn from(hash: Hash) -> Self {
        match hash {
            Hash::Sha256 => HashFunction::Sha256,
            Hash::Blake2s => HashFunction::Blake2s,
        }
    }
}

fn print_report(role: &str, report: &ExchangeReport) {
    println!("[{role}] verification code: {}", report.verification_code);
    println!(
        "[{role}] message received: {}",
        String::from_utf8_lossy(&report.received)
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    decidr_common::init_tracing_with_default(&args.log_level);

    let handshake = Handshake::new(NoiseConfig::new(args.hash.into()));
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match args.command {
        Command::Admin {
            id,
            client,
            reply,
            key,
        } => {
            let admin = match key {
                Some(path) => {
                    let keypair = keyfile::load(&path)
                        .with_context(|| format!("failed to load {}", path.display()))?;
                    AdminEndpoint::connect_with_keypair(&args.relay, &id, &client, keypair).await?
                }
                None => AdminEndpoint::connect(&args.relay, &id, &client).await?,
            }
            .with_handshake(handshake);
            println!("[admin] public key: {}", hex::encode(admin.public_key()));
            let report = admin.run(&cancel, reply.as_bytes()).await?;
            print_report("admin", &report);
        }
        Command::Client {
            id,
            admin,
            admin_key,
            message,
        } => {
            let mut client = ClientEndpoint::connect(&args.relay, &id, &admin)
                .await?
                .with_handshake(handshake);
            if let Some(key) = admin_key {
                let key = hex::decode(key.trim())
                    .map_err(decidr_common::Error::config)
                    .context("invalid --admin-key")?;
                client = client.pin_admin_key(key);
            }
            let report = client.run(&cancel, message.as_bytes()).await?;
            print_report("client", &report);
        }
        Command::Demo { admin, client } => {
            let admin_endpoint = AdminEndpoint::connect(&args.relay, &admin, &client)
                .await?
                .with_handshake(handshake);
            let client_endpoint = ClientEndpoint::connect(&args.relay, &client, &admin)
                .await?
                .with_handshake(handshake)
                .pin_admin_key(admin_endpoint.public_key().to_vec());

            let (admin_report, client_report) = tokio::try_join!(
                admin_endpoint.run(&cancel, b"hello client"),
                client_endpoint.run(&cancel, b"hello admin"),
            )?;
            print_report("admin", &admin_report);
            print_report("client", &client_report);

            if admin_report.verification_code != client_report.verification_code {
                return Err(decidr_common::Error::crypto("verification codes differ").into());
            }
            println!("verification codes match");
        }
        Command::Keygen { output } => {
            let keypair = generate_static_keypair().context("failed to generate keypair")?;
            let public_path = keyfile::save(&keypair, &output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Private key:         {}", output.display());
            println!("Public key file:     {}", public_path.display());
            println!("Public key (hex):    {}", hex::encode(keypair.public_key()));
            println!("Public key (base64): {}", STANDARD.encode(keypair.public_key()));
        }
    }

    Ok(())
}
