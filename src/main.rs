//! Command line interface for the publishing core. Supports key derivation,
//! identifier conversion, event id computation, signing, verification, and
//! publication to configured relays.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use postr::config::Settings;
use postr::event::{self, EventDraft, Tag};
use postr::keys::{self, SecretKey};
use postr::relay::{self, PublishStatus};

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "postr",
    author,
    version,
    about = "Nostr identity and relay publishing tool"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Derive the public identity (npub and hex) for a secret key.
    Derive {
        /// Secret key in nsec form; falls back to `NSEC` from the env file.
        #[arg(long)]
        nsec: Option<String>,
    },
    /// Convert between npub and hex public key forms.
    Convert {
        /// An `npub1…` identifier or 64-char hex key.
        value: String,
    },
    /// Compute the canonical id of an event JSON file.
    Id {
        /// Path to a JSON event (id/sig fields may be absent).
        file: String,
    },
    /// Sign a draft event file and print the complete event.
    Sign {
        /// Path to a JSON draft with kind, created_at, tags, content.
        file: String,
        /// Secret key in nsec form; falls back to `NSEC` from the env file.
        #[arg(long)]
        nsec: Option<String>,
    },
    /// Verify the id and signature of a signed event file.
    Verify {
        /// Path to a signed JSON event.
        file: String,
    },
    /// Sign a note and publish it to every configured relay.
    Publish {
        /// Note content.
        content: String,
        /// Event kind.
        #[arg(long, default_value_t = 1)]
        kind: u32,
        /// Tag in NAME=VALUE form; repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Derive { nsec } => {
            let secret = load_secret(nsec, &cli.env)?;
            let pubkey = secret.x_only_public_key()?;
            let hex_key = hex::encode(pubkey);
            println!("npub: {}", keys::hex_to_npub(&hex_key)?);
            println!("hex:  {hex_key}");
        }
        Commands::Convert { value } => {
            let trimmed = value.trim();
            if trimmed.to_lowercase().starts_with("npub1") {
                let hex_key = keys::identifier_to_hex(trimmed)
                    .ok_or_else(|| anyhow!("not a valid npub identifier"))?;
                println!("{hex_key}");
            } else {
                println!("{}", keys::hex_to_npub(trimmed)?);
            }
        }
        Commands::Id { file } => {
            let data = fs::read_to_string(&file)?;
            let val: serde_json::Value = serde_json::from_str(&data)?;
            let pubkey = val
                .get("pubkey")
                .and_then(|v| v.as_str())
                .context("event file is missing pubkey")?;
            let created_at = val
                .get("created_at")
                .and_then(|v| v.as_u64())
                .context("event file is missing created_at")?;
            let kind = val.get("kind").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
            let tags: Vec<Tag> = match val.get("tags") {
                Some(v) => serde_json::from_value(v.clone())?,
                None => vec![],
            };
            let content = val.get("content").and_then(|v| v.as_str()).unwrap_or("");
            println!(
                "{}",
                event::compute_id(pubkey, created_at, kind, &tags, content)?
            );
        }
        Commands::Sign { file, nsec } => {
            let data = fs::read_to_string(&file)?;
            let mut draft: EventDraft = serde_json::from_str(&data)?;
            if draft.created_at == 0 {
                draft.created_at = unix_now()?;
            }
            let secret = load_secret(nsec, &cli.env)?;
            let ev = event::sign_draft_with_key(&draft, &secret)?;
            println!("{}", serde_json::to_string_pretty(&ev)?);
        }
        Commands::Verify { file } => {
            let data = fs::read_to_string(&file)?;
            let ev: event::Event = serde_json::from_str(&data)?;
            event::verify_event(&ev)?;
            println!("valid: {}", ev.id);
        }
        Commands::Publish {
            content,
            kind,
            tags,
        } => {
            let cfg = Settings::from_env(&cli.env)?;
            if cfg.relays.is_empty() {
                bail!("no relays configured; set RELAYS in {}", cli.env);
            }
            let nsec = cfg
                .nsec
                .clone()
                .with_context(|| format!("NSEC is not set in {}", cli.env))?;
            let secret = SecretKey::from_nsec(&nsec)?;
            let draft = EventDraft {
                kind,
                created_at: unix_now()?,
                tags: parse_tags(&tags)?,
                content,
            };
            let ev = event::sign_draft_with_key(&draft, &secret)?;
            let report = relay::publish_event(&cfg.relays, &ev, &cfg.relay_timeouts()).await;
            for outcome in &report.outcomes {
                match &outcome.status {
                    PublishStatus::Acknowledged => {
                        println!("{}: acknowledged", outcome.relay)
                    }
                    PublishStatus::Rejected { reason } => {
                        println!("{}: rejected ({reason})", outcome.relay)
                    }
                    PublishStatus::Failed { reason } => {
                        println!("{}: failed ({reason})", outcome.relay)
                    }
                }
            }
            if !report.accepted() {
                bail!("no relay acknowledged event {}", ev.id);
            }
            println!("published: {}", ev.id);
        }
    }
    Ok(())
}

/// Resolve the signing key from a flag or the env file, preferring the flag.
fn load_secret(flag: Option<String>, env_path: &str) -> anyhow::Result<SecretKey> {
    let nsec = match flag {
        Some(nsec) => nsec,
        None => Settings::from_env(env_path)?
            .nsec
            .context("no nsec given and NSEC is not set")?,
    };
    Ok(SecretKey::from_nsec(&nsec)?)
}

/// Parse repeated `NAME=VALUE` flags into event tags.
fn parse_tags(raw: &[String]) -> anyhow::Result<Vec<Tag>> {
    let mut pairs = Vec::with_capacity(raw.len());
    for s in raw {
        let (name, value) = s
            .split_once('=')
            .with_context(|| format!("tag {s:?} is not NAME=VALUE"))?;
        pairs.push((name, value));
    }
    Ok(event::tags_from_pairs(pairs))
}

/// Current Unix time in seconds.
fn unix_now() -> anyhow::Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before epoch")?
        .as_secs())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    run(Cli::parse()).await
}
