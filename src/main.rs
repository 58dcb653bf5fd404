use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agora_core::config::{dirs_home, AppConfig, ModelConfig};
use agora_core::event::EventBus;
use agora_core::types::{ChatMode, HeavyEvent};

use agora_heavy::{
    default_agents, export_preset, load_preset, ranks, AgentGraph, ChatReply, ChatSession,
    PresetLibrary,
};
use agora_llm::TieredGenerator;

#[derive(Parser)]
#[command(name = "agora", version, about = "Chat client with a multi-agent heavy mode")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "agora.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL mode
    Repl {
        /// Start in heavy mode
        #[arg(long)]
        heavy: bool,
    },
    /// Send a single message and exit
    Run {
        /// Route the message through the agent graph
        #[arg(long)]
        heavy: bool,
        /// Agent preset to use instead of the configured one
        #[arg(long)]
        preset: Option<PathBuf>,
        /// Print every agent's response before the final answer
        #[arg(long)]
        show_agents: bool,
        /// The message (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Show current configuration
    Config,
    /// Inspect and export agent presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// Check a preset file and report its ranks and dropped edges
    Validate {
        file: PathBuf,
    },
    /// Print the agents of a preset (the built-in graph when no file is given)
    Show {
        file: Option<PathBuf>,
    },
    /// Write the built-in graph as a preset file
    ExportDefault {
        /// Output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agora=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Commands that need no model config
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "agora", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Preset { action }) => return handle_preset_cli(action),
        _ => {}
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Commands::Run {
            heavy,
            preset,
            show_agents,
            prompt,
        }) => {
            let mut text = prompt.join(" ");
            if text.is_empty() {
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            if text.trim().is_empty() {
                anyhow::bail!("Nothing to send: pass a prompt or pipe one on stdin");
            }

            let (mut session, event_bus) = build_session(&config, preset.as_deref())?;
            if heavy {
                session.set_mode(ChatMode::Heavy);
            }
            let show = show_agents || config.heavy.show_agent_responses;
            send_and_print(&mut session, &event_bus, &text, show).await?;
        }
        Some(Commands::Repl { heavy }) => {
            let (mut session, event_bus) = build_session(&config, None)?;
            if heavy {
                session.set_mode(ChatMode::Heavy);
            }
            run_repl(&mut session, &event_bus, config.heavy.show_agent_responses).await?;
        }
        None => {
            let (mut session, event_bus) = build_session(&config, None)?;
            run_repl(&mut session, &event_bus, config.heavy.show_agent_responses).await?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::Preset { .. }) => {}
    }

    Ok(())
}

/// Config file, then `~/.agora/config.toml`, then API keys from the environment.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    let home_config = dirs_home().map(|h| h.join(".agora").join("config.toml"));
    if let Some(ref path) = home_config {
        if path.exists() {
            info!(path = %path.display(), "Loading config from home directory");
            return Ok(AppConfig::load(path)?);
        }
    }

    eprintln!("Warning: No config file found. Set ANTHROPIC_API_KEY or create agora.toml");
    create_env_config()
}

fn create_env_config() -> anyhow::Result<AppConfig> {
    let anthropic_key = std::env::var("ANTHROPIC_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    let (fast, pro) = if let Some(key) = anthropic_key {
        (
            ModelConfig::new("anthropic", "claude-3-5-haiku-latest").with_api_key(&key),
            ModelConfig::new("anthropic", "claude-sonnet-4-20250514").with_api_key(&key),
        )
    } else if let Some(key) = openai_key {
        (
            ModelConfig::new("openai", "gpt-4o-mini").with_api_key(&key),
            ModelConfig::new("openai", "gpt-4o").with_api_key(&key),
        )
    } else {
        anyhow::bail!("No model configured: create agora.toml or set ANTHROPIC_API_KEY / OPENAI_API_KEY");
    };

    let mut config = AppConfig::with_model(fast);
    config.models.pro = Some(pro);
    Ok(config)
}

fn build_session(
    config: &AppConfig,
    preset_override: Option<&Path>,
) -> anyhow::Result<(ChatSession, Arc<EventBus>)> {
    let generator = Arc::new(TieredGenerator::from_config(&config.models));
    let event_bus = Arc::new(EventBus::default());

    let mut presets = PresetLibrary::new();
    let preset_path = preset_override
        .map(Path::to_path_buf)
        .or_else(|| config.preset_path());
    if let Some(path) = preset_path {
        presets.import_file(&path)?;
        info!(path = %path.display(), agents = presets.active().len(), "Loaded agent preset");
    }

    let session = ChatSession::new(generator, config.chat.clone())
        .with_presets(presets)
        .with_events(event_bus.clone());
    Ok((session, event_bus))
}

async fn send_and_print(
    session: &mut ChatSession,
    event_bus: &EventBus,
    text: &str,
    show_agents: bool,
) -> anyhow::Result<()> {
    let mode = session.mode();
    let mut rx = event_bus.subscribe();
    let send = session.send(text);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            Ok(event) = rx.recv() => print_progress(&event),
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_progress(&event);
    }

    match result {
        Ok(reply) => print_reply(&reply, show_agents),
        Err(e) => {
            error!(error = %e, "Message failed");
            match mode {
                ChatMode::Heavy => eprintln!(
                    "\nHeavy mode failed. Your message was not added to the conversation; try again."
                ),
                ChatMode::Normal if e.is_generation() => {
                    eprintln!("\nModel request failed: {}", e)
                }
                ChatMode::Normal => eprintln!("\nError: {}", e),
            }
        }
    }
    Ok(())
}

fn print_progress(event: &HeavyEvent) {
    match event {
        HeavyEvent::RunStarted { ranks, .. } => {
            eprintln!("[HEAVY] Running {} rank(s)", ranks);
        }
        HeavyEvent::RankStarted { order, agents, .. } => {
            eprintln!("[HEAVY] Order {}: {}", order, agents.join(", "));
        }
        HeavyEvent::AgentFinished {
            name, elapsed_ms, ..
        } => {
            eprintln!("  done: {} ({} ms)", name, elapsed_ms);
        }
        HeavyEvent::AgentFailed { name, error, .. } => {
            eprintln!("  failed: {} ({})", name, error);
        }
        HeavyEvent::RunCompleted { elapsed_ms, .. } => {
            eprintln!("[HEAVY] Finished in {} ms\n", elapsed_ms);
        }
        HeavyEvent::RunFailed { .. } => {}
    }
}

fn print_reply(reply: &ChatReply, show_agents: bool) {
    if show_agents && !reply.agent_responses.is_empty() {
        for response in &reply.agent_responses {
            println!(
                "--- {} (order {}, {}) ---\n{}\n",
                response.name, response.order, response.model, response.text
            );
        }
        println!("--- Final answer ---");
    }
    println!("{}", reply.text);
}

fn print_agents(graph: &AgentGraph) {
    if graph.is_empty() {
        println!("No agents configured.");
        return;
    }
    for rank in ranks(graph) {
        println!("Order {}:", rank.order);
        for node in rank.nodes {
            let targets = if node.connections.is_empty() {
                "(terminal)".to_string()
            } else {
                format!("-> {}", node.connections.join(", "))
            };
            println!("  {} [{}] ({}) {}", node.name, node.id, node.model, targets);
        }
    }
    for dropped in graph.dropped_edges() {
        println!(
            "Dropped edge {} -> {}: {}",
            dropped.from, dropped.to, dropped.reason
        );
    }
}

async fn run_repl(
    session: &mut ChatSession,
    event_bus: &EventBus,
    show_agents: bool,
) -> anyhow::Result<()> {
    println!("Agora v{}", env!("CARGO_PKG_VERSION"));
    println!("Mode: {:?}", session.mode());
    println!("Type /help for commands, /quit to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let prompt = match session.mode() {
            ChatMode::Normal => "> ",
            ChatMode::Heavy => "heavy> ",
        };
        print!("{}", prompt);
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break; // EOF
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();

        match parts[0] {
            "/quit" | "/exit" | "/q" => {
                println!("Goodbye!");
                break;
            }
            "/help" => {
                println!("/heavy          switch to heavy mode");
                println!("/normal         switch to normal mode");
                println!("/clear          forget the conversation");
                println!("/agents         show the active agent graph");
                println!("/import FILE    load an agent preset");
                println!("/export FILE    save the active agents as a preset");
                println!("/reset          restore the built-in agents");
                println!("/quit           exit");
                continue;
            }
            "/heavy" => {
                session.set_mode(ChatMode::Heavy);
                println!("Heavy mode on.");
                continue;
            }
            "/normal" => {
                session.set_mode(ChatMode::Normal);
                println!("Normal mode on.");
                continue;
            }
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
                continue;
            }
            "/agents" => {
                print_agents(session.presets().active());
                continue;
            }
            "/import" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: /import FILE");
                    continue;
                };
                match session.presets_mut().import_file(Path::new(path)) {
                    Ok(graph) => println!("Imported {} agent(s).", graph.len()),
                    Err(e) => println!("Import rejected, agents unchanged: {}", e),
                }
                continue;
            }
            "/export" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: /export FILE");
                    continue;
                };
                match session
                    .presets()
                    .export()
                    .and_then(|json| std::fs::write(path, json).map_err(Into::into))
                {
                    Ok(()) => println!("Exported to {}.", path),
                    Err(e) => println!("Export failed: {}", e),
                }
                continue;
            }
            "/reset" => {
                session.presets_mut().reset();
                println!("Built-in agents restored.");
                continue;
            }
            _ => {}
        }

        send_and_print(session, event_bus, input, show_agents).await?;
        println!();
    }

    Ok(())
}

fn handle_preset_cli(action: &PresetAction) -> anyhow::Result<()> {
    match action {
        PresetAction::Validate { file } => {
            let graph = AgentGraph::new(load_preset(file)?);
            let rank_count = ranks(&graph).len();
            println!(
                "{}: {} agent(s) in {} rank(s), {} terminal(s)",
                file.display(),
                graph.len(),
                rank_count,
                graph.terminals().len()
            );
            for dropped in graph.dropped_edges() {
                println!(
                    "  dropped edge {} -> {}: {}",
                    dropped.from, dropped.to, dropped.reason
                );
            }
        }
        PresetAction::Show { file } => {
            let graph = match file {
                Some(path) => AgentGraph::new(load_preset(path)?),
                None => AgentGraph::new(default_agents()),
            };
            print_agents(&graph);
        }
        PresetAction::ExportDefault { output } => {
            let json = export_preset(&default_agents())?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}
