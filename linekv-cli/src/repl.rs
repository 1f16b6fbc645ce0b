//! Interactive REPL.

use colored::Colorize;
use linekv_client::Client;
use linekv_protocol::{Command, Reply};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

const HELP_TEXT: &str = r#"
Commands are sent verbatim using the line protocol, e.g.:
  set foo bar                   Store a value (rest of line is the value)
  get foo                       Fetch a value
  del foo                       Delete a key
  keys *                        List keys matching a pattern
  incr counter                  Increment a numeric key
  select 2                      Switch database
  dbsize                        Count keys

  help                          Show this help
  quit, exit                    Exit the REPL
"#;

/// Verbs whose final argument is sent as a length-prefixed payload.
const PAYLOAD_VERBS: [&str; 3] = ["SET", "APPEND", "GETSET"];

pub async fn run(
    mut client: Client,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "linekv CLI".bold().cyan());
    println!("Connected to {}:{}", host, port);

    // Create readline editor
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    // Load history
    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".linekv_history"))
        .unwrap_or_else(|_| ".linekv_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", format!("{}:{}>", host, port).cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&mut client, line).await {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break, // Exit command
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    // Save history
    let _ = rl.save_history(&history_path);

    // Disconnect
    client.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

async fn execute_repl_command(
    client: &mut Client,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let verb = parts[0].to_uppercase();

    match verb.as_str() {
        "HELP" => return Ok(Some(HELP_TEXT.to_string())),
        "QUIT" | "EXIT" => return Ok(None),
        // Routed through the typed method so the tracked database index
        // stays honest.
        "SELECT" => {
            if let Some(id) = parts.get(1).and_then(|s| s.parse().ok()) {
                client.select(id).await?;
                return Ok(Some("OK".green().to_string()));
            }
        }
        _ => {}
    }

    let command = build_command(&verb, &parts[1..]);
    let reply = client.raw_command(command).await?;
    Ok(Some(format_reply(&reply)))
}

/// Builds a command from REPL tokens. For payload verbs everything after
/// the key is the value, so values may contain spaces.
fn build_command(verb: &str, args: &[&str]) -> Command {
    if PAYLOAD_VERBS.contains(&verb) && args.len() >= 2 {
        return Command::new(verb)
            .arg(args[0])
            .payload(args[1..].join(" ").into_bytes());
    }

    let mut command = Command::new(verb);
    for arg in args {
        command = command.arg(arg);
    }
    command
}

fn format_reply(reply: &Reply) -> String {
    match reply {
        Reply::Status(text) => text.green().to_string(),
        Reply::Error(_) => format!(
            "{} {}",
            "(error)".red(),
            reply.error_text().unwrap_or_default()
        ),
        Reply::Integer(n) => format!("(integer) {}", n),
        Reply::Bulk(None) => "(nil)".dimmed().to_string(),
        Reply::Bulk(Some(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        Reply::Array(items) => {
            if items.is_empty() {
                return "(empty list)".dimmed().to_string();
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{}) {}", i + 1, format_reply(item)))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}
