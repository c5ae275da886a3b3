//! CLI entry point for chatstream.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;

use chatstream::client::ChatClient;
use chatstream::config::Config;
use chatstream::error_taxonomy::ErrorEnvelope;
use chatstream::hooks;
use chatstream::logging;
use chatstream::models::{ChatMessage, CompletionResponse, CompletionResult};
use chatstream::terminal::TerminalSink;

#[derive(Parser, Debug)]
#[command(
    name = "chatstream",
    author,
    version,
    about = "Stream a chat completion from any OpenAI-compatible endpoint",
    long_about = "Send a prompt to an OpenAI-compatible /chat/completions endpoint and stream the answer.\n\nReads the prompt from stdin when --prompt is not given. Press Ctrl-C to stop streaming and keep the partial answer."
)]
struct Cli {
    /// Prompt to send (reads stdin when omitted)
    #[arg(short, long)]
    prompt: Option<String>,

    /// System prompt to prepend to the conversation
    #[arg(short, long)]
    system: Option<String>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Config profile name
    #[arg(long)]
    profile: Option<String>,

    /// Provider preset (openai, deepseek, openrouter, ollama)
    #[arg(long)]
    provider: Option<String>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum output tokens
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature (0.0-2.0)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// JSON file with tool definitions to advertise
    #[arg(long)]
    tools_file: Option<String>,

    /// Print only the final result (no streaming output, no Ctrl-C handling)
    #[arg(long)]
    silent: bool,

    /// Print the completion result as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Config {
        Config {
            provider: self.provider.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system_prompt: self.system.clone(),
            tools_file: self.tools_file.clone(),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.clone(), cli.profile.as_deref(), cli.overrides())?;
    let engine = config.resolve()?;
    if engine.api_key.is_none() {
        logging::warn(format!(
            "No API key configured for {}; sending an unauthenticated request",
            engine.completions_url
        ));
    }

    let prompt = read_prompt(cli.prompt.as_deref())?;
    let mut messages = Vec::new();
    if let Some(system) = config.system_prompt.as_deref()
        && !system.trim().is_empty()
    {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));

    let client = ChatClient::new(engine)?;
    let streamed = !(cli.silent || cli.json);
    let outcome = if streamed {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if hooks::cancel_on_interrupt(cancel, tokio::signal::ctrl_c).await {
                    eprintln!("\n{}", "[interrupted]".dimmed());
                    std::process::exit(130);
                }
            })
        };
        let mut sink = TerminalSink::stdout();
        let outcome = client.stream_completion(&messages, &mut sink, &cancel).await;
        watcher.abort();
        if sink.wrote_output() {
            println!();
        }
        outcome
    } else {
        client.complete_silent(&messages).await
    };

    match outcome {
        Ok(result) => {
            print_result(&result, &cli, streamed)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let envelope = ErrorEnvelope::from(&err);
            logging::debug(format!("{envelope:?}"));
            eprintln!(
                "{} [{}] {}",
                "error:".red().bold(),
                envelope.code,
                envelope.message
            );
            Ok(ExitCode::from(1))
        }
    }
}

fn read_prompt(prompt: Option<&str>) -> Result<String> {
    if let Some(prompt) = prompt {
        return Ok(prompt.to_string());
    }
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("No prompt given. Pass --prompt or pipe one on stdin.");
    }
    let mut prompt = String::new();
    stdin
        .read_to_string(&mut prompt)
        .context("Failed to read prompt from stdin")?;
    if prompt.trim().is_empty() {
        bail!("Prompt read from stdin is empty");
    }
    Ok(prompt)
}

fn print_result(result: &CompletionResult, cli: &Cli, streamed: bool) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    match &result.response {
        CompletionResponse::Text(text) => {
            if !streamed {
                println!("{text}");
            }
        }
        CompletionResponse::ToolCalls(calls) => {
            for call in calls {
                println!(
                    "{} {}({}) {}",
                    "tool call".cyan(),
                    call.function.name.bold(),
                    call.function.arguments,
                    format!("[{}]", call.id).dimmed()
                );
            }
        }
    }

    if result.cancelled {
        eprintln!("{}", "[cancelled]".dimmed());
    }
    if let Some(usage) = result.usage {
        logging::info(format!(
            "Tokens: prompt={} completion={} total={}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        ));
    }
    Ok(())
}
