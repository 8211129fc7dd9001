use anyhow::{anyhow, Context, Result};
use bat::PrettyPrinter;
use clap::{Parser, ValueEnum};
use cliclack::{input, intro, log, note, outro, spinner, ProgressBar};
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use toolchat::agent::{
    Agent, AgentConfig, TurnObserver, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use toolchat::errors::TurnPhase;
use toolchat::providers::configs::base::ProviderConfig;
use toolchat::providers::configs::groq::GroqProviderConfig;
use toolchat::providers::configs::openai::OpenAiProviderConfig;
use toolchat::providers::openai::OpenAiProvider;
use toolchat::providers::types::content::ToolUse;
use toolchat::tools::builtin_registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Groq,
    OpenAi,
}

#[derive(Parser)]
#[command(author, version, about = "Chat with a model that can read, write and query local files", long_about = None)]
struct Cli {
    /// Which OpenAI-compatible service to talk to
    #[arg(short, long, value_enum, default_value_t = ProviderKind::Groq)]
    provider: ProviderKind,

    /// API key (can also be set via GROQ_API_KEY or OPENAI_API_KEY)
    #[arg(short, long)]
    api_key: Option<String>,

    /// Override the service host (or set GROQ_API_HOST / OPENAI_API_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Model to use
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Maximum number of tokens in each model answer
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: i32,

    /// System prompt sent ahead of the conversation
    #[arg(short, long)]
    system: Option<String>,
}

impl Cli {
    fn provider_config(&self) -> Result<OpenAiProviderConfig> {
        let mut config: OpenAiProviderConfig = match (self.provider, self.api_key.clone()) {
            (ProviderKind::Groq, Some(key)) => GroqProviderConfig::with_api_key(key)?.into(),
            (ProviderKind::Groq, None) => GroqProviderConfig::from_env()
                .context("API key must be provided via --api-key or GROQ_API_KEY")?
                .into(),
            (ProviderKind::OpenAi, Some(key)) => OpenAiProviderConfig::with_api_key(key)?,
            (ProviderKind::OpenAi, None) => OpenAiProviderConfig::from_env()
                .context("API key must be provided via --api-key or OPENAI_API_KEY")?,
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        Ok(config)
    }

    fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model.clone(),
            system: self.system.clone().filter(|s| !s.trim().is_empty()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Spinner per model call and a dim line per tool call. The reasoning
/// segment is held until the turn is over.
#[derive(Default)]
struct CliObserver {
    spinner: Option<ProgressBar>,
    reasoning: Option<String>,
}

impl TurnObserver for CliObserver {
    fn model_call_started(&mut self, phase: TurnPhase) {
        let spin = spinner();
        spin.start(match phase {
            TurnPhase::Initial => "Thinking...",
            TurnPhase::FollowUp => "Processing...",
        });
        self.spinner = Some(spin);
    }

    fn model_call_finished(&mut self, _phase: TurnPhase) {
        if let Some(spin) = self.spinner.take() {
            spin.stop("");
        }
    }

    fn tool_started(&mut self, call: &ToolUse) {
        println!("{}", style(format!("Executing {}...", call.name)).dim());
    }

    fn reasoning(&mut self, reasoning: &str) {
        if !reasoning.is_empty() {
            self.reasoning = Some(reasoning.to_string());
        }
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider = OpenAiProvider::new(cli.provider_config()?)?;
    let tools = builtin_registry()?;
    let mut agent = Agent::new(Box::new(provider), tools, cli.agent_config());
    info!(provider = ?cli.provider, model = %agent.config().model, "session started");

    intro(style(" toolchat ").on_cyan().black())?;
    println!(
        "{} {}",
        style(format!("Using {} with {} tools", agent.config().model, agent.tools().len())).dim(),
        style("- type \"quit\" to end the session").dim()
    );

    loop {
        let message_text: String = input("You").placeholder("").interact()?;

        if message_text.trim().eq_ignore_ascii_case("quit") {
            break;
        }

        let mut observer = CliObserver::default();
        match agent.reply(&message_text, &mut observer) {
            Ok(answer) => {
                if let Some(reasoning) = observer.reasoning.take() {
                    note("Thinking Process", reasoning)?;
                }
                render(&answer)?;
                println!();
            }
            Err(err) => log::error(format!("Error: {}", err))?,
        }
    }

    outro("Goodbye!")?;
    Ok(())
}

fn render(content: &str) -> Result<()> {
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()
        .map_err(|e| anyhow!("Failed to render the answer: {}", e))?;
    Ok(())
}
