//! kvault - encrypted, compressed key-value storage from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use kvault_storage::{Connection, Storage, Value};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;

/// kvault - encrypted, compressed key-value storage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "KVAULT_CONFIG", default_value = "config/kvault.toml")]
    config: String,

    /// Collection to operate on
    #[arg(long, env = "KVAULT_COLLECTION", default_value = "default")]
    collection: String,

    /// Backend kind (memory, filesystem, objectstore)
    #[arg(long, env = "KVAULT_BACKEND")]
    backend: Option<String>,

    /// Encryption password
    #[arg(long, env = "KVAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Hex-encoded key derivation salt
    #[arg(long, env = "KVAULT_SALT")]
    salt: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a JSON value under a key
    Put { key: String, value: String },
    /// Print the value stored under a key
    Get { key: String },
    /// Remove a key
    Delete { key: String },
    /// Print the value stored under a key and remove it
    Pop { key: String },
    /// Print every key, newest first
    List,
    /// Print every key and value, newest first
    Items,
    /// Print the number of keys
    Len,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }
    if let Some(password) = args.password {
        config.storage.password = Some(password);
    }
    if let Some(salt) = args.salt {
        config.storage.salt = Some(salt);
    }

    init_logging(&config.logging.level);

    let kind = config.backend_kind()?;
    let connection = Connection::open(kind, &config.storage_options())
        .await
        .with_context(|| format!("Failed to open {} storage", kind))?;
    let storage = connection
        .collection(&args.collection)
        .with_context(|| format!("Failed to open collection: {}", args.collection))?;

    info!("Using collection {} on {}", storage.name(), kind);
    run(&storage, args.command).await
}

async fn run(storage: &Storage, command: Command) -> Result<()> {
    match command {
        Command::Put { key, value } => {
            let value: serde_json::Value =
                serde_json::from_str(&value).context("Value must be valid JSON")?;
            let blob = storage.put(&key, &value).await?;
            debug!("Stored {} ({} bytes)", key, blob.len());
        }
        Command::Get { key } => match storage.get::<Value>(&key).await? {
            Some(value) => println!("{}", to_json(&value)?),
            None => anyhow::bail!("Key not found: {}", key),
        },
        Command::Delete { key } => {
            storage
                .delete(&key)
                .await
                .with_context(|| format!("Failed to delete key: {}", key))?;
        }
        Command::Pop { key } => match storage.pop::<Value>(&key).await? {
            Some(value) => println!("{}", to_json(&value)?),
            None => anyhow::bail!("Key not found: {}", key),
        },
        Command::List => {
            for key in storage.list().await? {
                println!("{}", key);
            }
        }
        Command::Items => {
            let items = storage.items::<Value>().await?;
            let mut items = std::pin::pin!(items);
            while let Some((key, value)) = items.try_next().await? {
                println!("{}\t{}", key, to_json(&value)?);
            }
        }
        Command::Len => println!("{}", storage.len().await?),
    }
    Ok(())
}

/// Render a stored value as compact JSON
fn to_json(value: &Value) -> Result<String> {
    let json = serde_json::to_value(value).context("Value has no JSON representation")?;
    Ok(json.to_string())
}

/// Initialize logging
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvault_storage::{BackendKind, StorageOptions};
    use tempfile::TempDir;

    #[test]
    fn test_parse_put() {
        let args = Args::try_parse_from([
            "kvault",
            "--collection",
            "c",
            "--password",
            "x",
            "put",
            "k",
            r#"{"a":1}"#,
        ])
        .unwrap();
        assert_eq!(args.collection, "c");
        assert_eq!(args.password.as_deref(), Some("x"));
        assert!(matches!(args.command, Command::Put { ref key, .. } if key == "k"));
    }

    #[test]
    fn test_parse_requires_command() {
        assert!(Args::try_parse_from(["kvault"]).is_err());
    }

    #[tokio::test]
    async fn test_run_against_filesystem() {
        let dir = TempDir::new().unwrap();
        let options = StorageOptions::default()
            .with_path(dir.path())
            .with_password("x");
        let connection = Connection::open(BackendKind::Filesystem, &options)
            .await
            .unwrap();
        let storage = connection.collection("cli").unwrap();

        run(
            &storage,
            Command::Put {
                key: "k".to_string(),
                value: r#"{"items":[1,2,3],"name":"kv"}"#.to_string(),
            },
        )
        .await
        .unwrap();

        let stored: serde_json::Value = storage.get("k").await.unwrap().unwrap();
        assert_eq!(stored["name"], "kv");
        assert_eq!(stored["items"][2], 3);

        run(&storage, Command::Pop { key: "k".to_string() })
            .await
            .unwrap();
        assert!(storage.is_empty().await.unwrap());
        assert!(
            run(&storage, Command::Get { key: "k".to_string() })
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_json() {
        let connection = Connection::open(BackendKind::Memory, &StorageOptions::default())
            .await
            .unwrap();
        let storage = connection.collection("cli").unwrap();

        let result = run(
            &storage,
            Command::Put {
                key: "k".to_string(),
                value: "{not json".to_string(),
            },
        )
        .await;
        assert!(result.is_err());
        assert!(!storage.contains("k").await.unwrap());
    }

    #[test]
    fn test_to_json() {
        let value = Value::Array(vec![Value::Integer(1.into()), Value::Text("a".into())]);
        assert_eq!(to_json(&value).unwrap(), r#"[1,"a"]"#);
    }
}
