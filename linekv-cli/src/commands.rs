//! Command execution.

use crate::Commands;
use colored::Colorize;
use linekv_client::Client;

/// Executes a one-shot command and returns the formatted output.
pub async fn execute(
    client: &mut Client,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl => unreachable!(),

        Commands::Ping => {
            client.ping().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Get { key } => match client.get(&key).await? {
            Some(value) => Ok(value),
            None => Ok("(nil)".dimmed().to_string()),
        },

        Commands::Set { key, value } => {
            client.set(&key, &value).await?;
            Ok("OK".green().to_string())
        }

        Commands::Del { key } => {
            let removed = client.del(&key).await?;
            Ok(format!("(integer) {}", removed))
        }

        Commands::Exists { key } => {
            let exists = client.exists(&key).await?;
            Ok(format!("(integer) {}", exists as i64))
        }

        Commands::Expire { key, seconds } => {
            let set = client.expire(&key, seconds).await?;
            Ok(format!("(integer) {}", set as i64))
        }

        Commands::Ttl { key } => {
            let ttl = client.ttl(&key).await?;
            Ok(format!("(integer) {}", ttl))
        }

        Commands::Keys { pattern } => {
            let keys = client.keys(&pattern).await?;
            if keys.is_empty() {
                return Ok("(empty list)".dimmed().to_string());
            }
            Ok(keys
                .iter()
                .enumerate()
                .map(|(i, key)| format!("{}) {}", i + 1, key))
                .collect::<Vec<_>>()
                .join("\n"))
        }

        Commands::Incr { key, by } => {
            let value = match by {
                Some(amount) => client.incr_by(&key, amount).await?,
                None => client.incr(&key).await?,
            };
            Ok(format!("(integer) {}", value))
        }

        Commands::Decr { key, by } => {
            let value = match by {
                Some(amount) => client.decr_by(&key, amount).await?,
                None => client.decr(&key).await?,
            };
            Ok(format!("(integer) {}", value))
        }

        Commands::Append { key, value } => {
            let len = client.append(&key, &value).await?;
            Ok(format!("(integer) {}", len))
        }

        Commands::Substr { key, start, end } => match client.substr(&key, start, end).await? {
            Some(slice) => Ok(slice),
            None => Ok("(nil)".dimmed().to_string()),
        },

        Commands::Dbsize => {
            let size = client.dbsize().await?;
            Ok(format!("(integer) {}", size))
        }

        Commands::Save => {
            client.save().await?;
            Ok("OK".green().to_string())
        }

        Commands::Lastsave => {
            let timestamp = client.lastsave().await?;
            Ok(format!("(integer) {}", timestamp))
        }

        Commands::Flushdb => {
            client.flushdb().await?;
            Ok("OK".green().to_string())
        }
    }
}
