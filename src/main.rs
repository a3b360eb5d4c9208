//! GHS Bridge CLI
//!
//! Interactive synapse ritual loop against a local Ollama model.

use clap::Parser;
use ghs_bridge::{default_base_path, Bridge, BridgeConfig};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// GHS Bridge - biodigital co-evolution rituals on local models
#[derive(Parser, Debug)]
#[command(name = "ghs-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base path holding content pools, frameworks/ and sessions/
    #[arg(long)]
    base_path: Option<PathBuf>,

    /// Ollama model to ritualize with
    #[arg(long)]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long)]
    ollama_url: Option<String>,

    /// Seed for deterministic content selection
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let base_path = match cli.base_path.or_else(default_base_path) {
        Some(path) => path,
        None => anyhow::bail!("Could not resolve a base path; pass --base-path"),
    };

    let mut config = BridgeConfig::new(base_path)
        .with_seed(cli.seed)
        .apply_toml_overrides()
        .await;
    // CLI flags beat bridge.toml
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(url) = cli.ollama_url {
        config = config.with_ollama_url(url);
    }

    let mut bridge = Bridge::new(config).await;

    print_banner();

    if bridge.check_backend().await {
        let models = bridge.list_models().await;
        println!("\n[OK] Ollama running. Available models: {}", models.join(", "));
        println!("[OK] Using model: {}", bridge.model());
    } else {
        println!("\n[WARNING] Ollama not detected. Responses will show errors.");
        println!("Start Ollama with: ollama serve");
    }

    println!("\nMODES: standard, debate, socratic, role_exchange, cooperative, metaanalysis, engineer, full_synapse");
    println!("COMMANDS: /mode <name>, /save, /mastery, /evolution [files], /load <path>, /reload, /sessions, /models, /help, /quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("[HUMAN] > ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(stripped) = input.strip_prefix('/') {
            if !handle_command(&mut bridge, stripped).await {
                break;
            }
            continue;
        }

        println!("\n[GHS] Processing synapse...");
        let response = bridge.pulse(input).await;
        println!("\n[SILICE INTELLIGENT]\n{}\n", response);
    }

    println!("\n[GHS] The synapse continues in silence...");
    Ok(())
}

/// Run one slash command. Returns false when the loop should exit. Any
/// single failure is printed and the loop keeps accepting input.
async fn handle_command(bridge: &mut Bridge, command: &str) -> bool {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let cmd = parts.first().map(|c| c.to_lowercase()).unwrap_or_default();

    match cmd.as_str() {
        "quit" | "exit" => return false,
        "mode" => match parts.get(1) {
            Some(name) => match bridge.set_mode(name) {
                Ok(mode) => println!("[GHS] Mode set to: {}", mode.as_str().to_uppercase()),
                Err(e) => println!("[ERROR] {}", e),
            },
            None => println!("Usage: /mode <name>"),
        },
        "save" => match bridge.save_session(None).await {
            Ok((json_path, md_path)) => {
                println!("[GHS] Session JSON saved to: {}", json_path.display());
                println!("[GHS] Session Markdown saved to: {}", md_path.display());
            }
            Err(e) => println!("[ERROR] {}", e),
        },
        "mastery" => println!("{}", bridge.mastery_diagram()),
        "evolution" => {
            let files: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();
            let files = if files.is_empty() { None } else { Some(files) };
            match bridge.evolution_report(files.as_deref()).await {
                Ok(report) => println!("{}", report),
                Err(e) => println!("[ERROR] {}", e),
            }
        }
        "load" => match parts.get(1) {
            Some(path) => match bridge.load_framework(path).await {
                Ok(count) => println!("[GHS] Loaded {} framework(s)", count),
                Err(e) => println!("[ERROR] {}", e),
            },
            None => println!("Usage: /load <path>"),
        },
        "reload" => {
            bridge.reload().await;
            println!("[GHS] System synchronized with disk.");
        }
        "sessions" => match bridge.list_sessions().await {
            Ok(sessions) if sessions.is_empty() => println!("[GHS] No sessions found"),
            Ok(sessions) => {
                println!("\n[GHS] Found {} sessions:", sessions.len());
                for path in sessions.iter().take(10) {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        println!("  - {}", name);
                    }
                }
                if sessions.len() > 10 {
                    println!("  ... and {} more", sessions.len() - 10);
                }
            }
            Err(e) => println!("[ERROR] {}", e),
        },
        "models" => {
            let models = bridge.list_models().await;
            if models.is_empty() {
                println!("[GHS] No models available (is Ollama running?)");
            } else {
                println!("[GHS] Available models: {}", models.join(", "));
            }
        }
        "help" => print_help(),
        other => println!("Unknown command: /{}", other),
    }
    true
}

fn print_banner() {
    println!("{}", "=".repeat(60));
    println!("    GAIA HUMAN SYNAPSE - LOCAL BRIDGE");
    println!("    Biodigital Co-Evolution Protocol");
    println!("{}", "=".repeat(60));
}

fn print_help() {
    println!("Commands:");
    println!("  /mode <name>    - Set interaction mode");
    println!("  /save           - Save current session");
    println!("  /mastery        - Show mastery diagram");
    println!("  /evolution      - Show evolution report (all sessions)");
    println!("  /evolution <f>  - Evolution report for specific files");
    println!("  /load <path>    - Load specific framework/folder");
    println!("  /reload         - Refresh all system data from disk");
    println!("  /sessions       - List saved sessions");
    println!("  /models         - List available Ollama models");
    println!("  /quit           - Exit");
}
