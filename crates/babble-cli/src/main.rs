use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use babble_client::config::{ClientConfig, TESTNET_CHAIN_ID};
use babble_client::{Delegation, DeliveredMessage, ProtocolClient};
use babble_crypto::address::{ACCEPTED_PREFIXES, ACCOUNT_PREFIX};
use babble_crypto::Identity;
use babble_proto::message::{MSG_TYPE_TEXT, MSG_TYPE_TRANSACTION};

#[derive(Parser)]
#[command(name = "babble")]
#[command(about = "End-to-end encrypted messaging over the Babble relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the address and public key derived from a seed
    Identity {
        #[arg(long)]
        seed: String,

        /// Address prefix (fetch or agent)
        #[arg(long, default_value = ACCOUNT_PREFIX)]
        prefix: String,
    },

    /// Print a delegation proof binding an account to a delegate
    Delegate {
        #[arg(long)]
        delegate_seed: String,

        #[arg(long)]
        account_seed: String,
    },

    /// Send a text message to an address
    Send {
        #[arg(long)]
        seed: String,

        #[arg(long, default_value = TESTNET_CHAIN_ID)]
        chain_id: String,

        /// Recipient delegate address
        #[arg(long)]
        to: String,

        /// Message type (1 = text, 2 = transaction)
        #[arg(long, default_value_t = MSG_TYPE_TEXT)]
        msg_type: u32,

        text: String,
    },

    /// Print messages waiting in the mailbox
    Receive {
        #[arg(long)]
        seed: String,

        #[arg(long, default_value = TESTNET_CHAIN_ID)]
        chain_id: String,
    },

    /// Exchange a message and a reply between two seeds
    Demo {
        #[arg(long)]
        seed_a: String,

        #[arg(long)]
        seed_b: String,

        #[arg(long, default_value = TESTNET_CHAIN_ID)]
        chain_id: String,
    },
}

/// The delegate is derived from the seed itself and the account from the
/// seed scoped to the chain.
async fn open_client(seed: &str, chain_id: &str, config: &ClientConfig) -> Result<ProtocolClient> {
    let delegate = Identity::from_seed(seed)?;
    let account = Identity::from_seed(&format!("{seed} {chain_id}"))?;
    let delegation = Delegation::new(&delegate, &account)?;
    let client = ProtocolClient::connect_http(delegation, account, chain_id, config)
        .await
        .with_context(|| format!("connecting {}", delegate.address()))?;
    info!(address = %client.delegate_address(), "client ready");
    Ok(client)
}

fn print_message(to: &str, msg: &DeliveredMessage) {
    println!(
        "[{}] {} -> {}: {}",
        msg.sent_at.to_rfc3339(),
        msg.sender,
        to,
        msg.text
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Identity { seed, prefix } => {
            if !ACCEPTED_PREFIXES.contains(&prefix.as_str()) {
                return Err(anyhow!("unsupported prefix '{prefix}'"));
            }
            let base = Identity::from_seed(&seed)?;
            let identity = Identity::with_prefix(base.secret_bytes(), &prefix)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "address": identity.address(),
                    "publicKey": identity.public_key(),
                    "publicKeyBase64": identity.public_key_b64(),
                }))?
            );
        }
        Commands::Delegate {
            delegate_seed,
            account_seed,
        } => {
            let delegate = Identity::from_seed(&delegate_seed)?;
            let account = Identity::from_seed(&account_seed)?;
            let delegation = Delegation::new(&delegate, &account)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "delegateAddress": delegation.address,
                    "delegatePublicKey": delegation.public_key,
                    "accountPublicKey": account.public_key(),
                    "proof": delegation.proof,
                }))?
            );
        }
        Commands::Send {
            seed,
            chain_id,
            to,
            msg_type,
            text,
        } => {
            if ![MSG_TYPE_TEXT, MSG_TYPE_TRANSACTION].contains(&msg_type) {
                return Err(anyhow!("unknown message type {msg_type}"));
            }
            let config = ClientConfig::from_env()?;
            let mut client = open_client(&seed, &chain_id, &config).await?;
            let sent = client.send_with_type(&to, &text, msg_type).await?;
            println!("sent {} at {}", sent.id, sent.sent_at.to_rfc3339());
        }
        Commands::Receive { seed, chain_id } => {
            let config = ClientConfig::from_env()?;
            let mut client = open_client(&seed, &chain_id, &config).await?;
            let batch = client.receive_batch().await?;
            let me = client.delegate_address().to_string();
            for msg in &batch.messages {
                print_message(&me, msg);
            }
            for failure in &batch.failures {
                eprintln!("could not open {}: {}", failure.id, failure.error);
            }
        }
        Commands::Demo {
            seed_a,
            seed_b,
            chain_id,
        } => {
            let config = ClientConfig::from_env()?;
            let mut alpha = open_client(&seed_a, &chain_id, &config).await?;
            let mut beta = open_client(&seed_b, &chain_id, &config).await?;

            let greeting = format!("why hello there {}", Utc::now().to_rfc3339());
            alpha.send(beta.delegate_address(), &greeting).await?;

            let beta_address = beta.delegate_address().to_string();
            for msg in beta.receive().await? {
                print_message(&beta_address, &msg);
                let reply = format!("thanks for the message: {}", msg.text);
                beta.send(alpha.delegate_address(), &reply).await?;
            }

            let alpha_address = alpha.delegate_address().to_string();
            for msg in alpha.receive().await? {
                print_message(&alpha_address, &msg);
            }
        }
    }

    Ok(())
}
