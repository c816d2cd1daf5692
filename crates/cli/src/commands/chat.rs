//! `toolstream chat`: single-message or interactive chat mode.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use toolstream_agent::{Agent, AgentStreamEvent};
use toolstream_config::AppConfig;
use toolstream_core::provider::Provider;
use tracing::debug;

#[derive(Debug, Default, Args)]
pub struct ChatArgs {
    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    pub message: Option<String>,

    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (clamped to 0.0–2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum generation rounds per message (0 = unbounded)
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Write the response to a file instead of stdout (single-message mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not offer the built-in abilities to the model
    #[arg(long)]
    pub no_abilities: bool,

    /// Name attached to the agent's messages
    #[arg(long)]
    pub name: Option<String>,
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup help when no key is available
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TOOLSTREAM_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY     = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = toolstream_providers::build_from_config(&config)?;
    let mut agent = build_agent(&config, &args, provider)?;

    match args.message {
        Some(message) => {
            agent.add_user_message(message);
            match &args.output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(path).await?;
                    agent.stream_to(&mut file).await?;
                    eprintln!("Response written to {}", path.display());
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    agent.stream_to(&mut stdout).await?;
                }
            }
        }
        None => interactive(&mut agent).await?,
    }

    Ok(())
}

/// Build the agent from config, with command-line overrides applied.
pub fn build_agent(
    config: &AppConfig,
    args: &ChatArgs,
    provider: Arc<dyn Provider>,
) -> toolstream_core::error::Result<Agent> {
    let mut agent = Agent::new(config.system_prompt.clone(), provider)
        .with_model(args.model.clone().unwrap_or_else(|| config.model.clone()))
        .with_temperature(args.temperature.unwrap_or(config.temperature))
        .with_max_rounds(args.max_rounds.map_or_else(|| config.round_limit(), Some));

    if let Some(max_tokens) = config.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }
    if let Some(name) = args.name.clone().or_else(|| config.agent_name.clone()) {
        agent = agent.with_name(name);
    }
    if !args.no_abilities {
        agent = agent.with_abilities(toolstream_abilities::all()?);
    }

    Ok(agent)
}

async fn interactive(agent: &mut Agent) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  Toolstream — interactive chat");
    println!();
    println!("  Model:      {}", agent.model());
    println!(
        "  Abilities:  {}",
        if agent.abilities().is_empty() {
            "none".to_string()
        } else {
            agent.abilities().join(", ")
        }
    );
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        agent.add_user_message(line);
        if let Err(e) = print_events(agent, &mut stdout).await {
            eprintln!("\n  [Error] {e}");
        }
    }

    println!();
    Ok(())
}

/// Stream one generation: text to `out`, ability calls to stderr.
async fn print_events(
    agent: &mut Agent,
    out: &mut tokio::io::Stdout,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = agent.events();
    while let Some(event) = events.next().await {
        match event? {
            AgentStreamEvent::Chunk { content } => {
                out.write_all(content.as_bytes()).await?;
                out.flush().await?;
            }
            AgentStreamEvent::ToolCall { name, arguments, .. } => {
                eprintln!("  [{name}] {arguments}");
            }
            AgentStreamEvent::ToolResult { name, success, .. } => {
                if !success {
                    eprintln!("  [{name}] failed");
                }
            }
            AgentStreamEvent::Done {
                rounds,
                tool_calls_made,
                usage,
            } => {
                debug!(
                    rounds,
                    tool_calls_made,
                    total_tokens = usage.map(|u| u.total_tokens),
                    "Response complete"
                );
            }
        }
    }
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolstream_core::error::ProviderError;
    use toolstream_core::provider::{ChunkReceiver, ProviderRequest};

    struct NullProvider;

    #[async_trait::async_trait]
    impl Provider for NullProvider {
        fn name(&self) -> &str {
            "null"
        }

        async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
            Err(ProviderError::NotConfigured("null provider".into()))
        }
    }

    #[test]
    fn agent_uses_config_values() {
        let config = AppConfig {
            model: "gpt-4o".into(),
            temperature: 0.4,
            max_rounds: 5,
            agent_name: Some("helper".into()),
            ..AppConfig::default()
        };
        let agent = build_agent(&config, &ChatArgs::default(), Arc::new(NullProvider)).unwrap();

        assert_eq!(agent.model(), "gpt-4o");
        assert!((agent.temperature() - 0.4).abs() < f32::EPSILON);
        assert_eq!(agent.max_rounds(), Some(5));
        assert_eq!(agent.name(), Some("helper"));
        assert_eq!(agent.abilities(), vec!["weather_lookup", "current_time"]);
        assert_eq!(agent.messages().as_slice()[0].content(), config.system_prompt);
    }

    #[test]
    fn args_override_config() {
        let args = ChatArgs {
            model: Some("local-model".into()),
            temperature: Some(5.0),
            max_rounds: Some(0),
            no_abilities: true,
            name: Some("cli".into()),
            ..ChatArgs::default()
        };
        let agent = build_agent(&AppConfig::default(), &args, Arc::new(NullProvider)).unwrap();

        assert_eq!(agent.model(), "local-model");
        assert_eq!(agent.temperature(), 2.0);
        assert_eq!(agent.max_rounds(), None);
        assert_eq!(agent.name(), Some("cli"));
        assert!(agent.abilities().is_empty());
    }

    #[test]
    fn zero_config_round_limit_is_unbounded() {
        let config = AppConfig {
            max_rounds: 0,
            ..AppConfig::default()
        };
        let agent = build_agent(&config, &ChatArgs::default(), Arc::new(NullProvider)).unwrap();
        assert_eq!(agent.max_rounds(), None);

        let args = ChatArgs {
            max_rounds: Some(3),
            ..ChatArgs::default()
        };
        let agent = build_agent(&config, &args, Arc::new(NullProvider)).unwrap();
        assert_eq!(agent.max_rounds(), Some(3));
    }
}
