use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli_style;

use chrono::DateTime;
use cli_style::{get_styles, level_color, print_error, print_success, print_warning, Card, Table};
use knowledge_admin_server::knowledge_store::{ApiKey, SqliteKnowledgeStore};
use knowledge_admin_server::{AccessLevel, KeyManager};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the SQLite knowledge database file.
    #[clap(value_parser = parse_path)]
    pub db_path: PathBuf,

    #[command(subcommand)]
    command: KeyCommand,
}

#[derive(Subcommand, Debug)]
enum KeyCommand {
    /// Creates an API key and prints its plaintext, which is shown only once.
    Create {
        #[clap(long)]
        owner: String,
        /// Access level, 1 to 4 or L1 to L4.
        #[clap(long)]
        level: AccessLevel,
        #[clap(long)]
        description: Option<String>,
    },

    /// Shows all API keys, active and revoked.
    List,

    /// Shows a single API key.
    Show { id: i64 },

    /// Revokes a key. The last active L4 key cannot be revoked.
    Revoke { id: i64 },

    /// Changes the access level of a key.
    SetLevel { id: i64, level: AccessLevel },

    /// Reactivates a revoked key.
    Reactivate { id: i64 },

    /// Shows the number of active keys per access level.
    Levels,

    /// Shows the path of the current knowledge db.
    Where,
}

fn format_timestamp(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn key_card(key: &ApiKey) -> Card {
    Card::new(format!("API key {}", key.id))
        .field("Prefix", key.key_prefix.as_str())
        .field("Owner", key.owner.as_str())
        .field("Description", key.description.as_deref().unwrap_or("-"))
        .colored_field(
            "Access level",
            format!("{} ({})", key.access_level, key.access_level.description()),
            level_color(key.access_level),
        )
        .field("Active", if key.is_active { "yes" } else { "no" })
        .field("Created", format_timestamp(Some(key.created_at)))
        .field("Last used", format_timestamp(key.last_used_at))
        .field("Revoked", format_timestamp(key.revoked_at))
}

fn print_key_table(keys: &[ApiKey]) {
    let mut table = Table::new(vec!["ID", "PREFIX", "OWNER", "LEVEL", "ACTIVE", "LAST USED"]);
    for key in keys {
        table.row(
            vec![
                key.id.to_string(),
                key.key_prefix.clone(),
                key.owner.clone(),
                key.access_level.to_string(),
                if key.is_active { "yes" } else { "no" }.to_string(),
                format_timestamp(key.last_used_at),
            ],
            key.is_active.then(|| level_color(key.access_level)),
        );
    }
    table.print("No API keys");
}

fn execute(command: KeyCommand, key_manager: &KeyManager, db_path: &Path) -> Result<()> {
    match command {
        KeyCommand::Create {
            owner,
            level,
            description,
        } => {
            let created =
                key_manager.create_key(&owner, description.as_deref(), level.as_int())?;
            print_success(&format!("Created API key {}", created.key.id));
            key_card(&created.key)
                .colored_field(
                    "Plaintext",
                    created.plaintext.as_str(),
                    level_color(created.key.access_level),
                )
                .print();
            print_warning("Store this key now, it cannot be shown again.");
        }
        KeyCommand::List => print_key_table(&key_manager.list_keys()?),
        KeyCommand::Show { id } => key_card(&key_manager.get_key(id)?).print(),
        KeyCommand::Revoke { id } => {
            let key = key_manager.revoke_key(id)?;
            print_success(&format!("Revoked API key {} ({})", key.id, key.key_prefix));
        }
        KeyCommand::SetLevel { id, level } => {
            let key = key_manager.update_access_level(id, level.as_int())?;
            print_success(&format!(
                "API key {} is now {}",
                key.id, key.access_level
            ));
        }
        KeyCommand::Reactivate { id } => {
            let key = key_manager.reactivate_key(id)?;
            print_success(&format!("API key {} is active", key.id));
        }
        KeyCommand::Levels => {
            let mut table = Table::new(vec!["LEVEL", "DESCRIPTION", "ACTIVE KEYS"]);
            for (level, count) in key_manager.active_key_counts()? {
                table.row(
                    vec![
                        level.to_string(),
                        level.description().to_string(),
                        count.to_string(),
                    ],
                    Some(level_color(level)),
                );
            }
            table.print("No access levels");
        }
        KeyCommand::Where => println!("{}", db_path.display()),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let store = SqliteKnowledgeStore::new(&cli_args.db_path)
        .with_context(|| format!("Failed to open {:?}", cli_args.db_path))?;
    let key_manager = KeyManager::new(Arc::new(store));

    if let Err(err) = execute(cli_args.command, &key_manager, &cli_args.db_path) {
        print_error(&format!("{}", err));
        std::process::exit(1);
    }
    Ok(())
}
