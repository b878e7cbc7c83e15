mod cli;
mod config;
mod llm;
mod logging;
mod market;
mod prompts;
mod session;
mod tools;

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use dotenvy::dotenv;
use tracing::{error, info};

use crate::cli::{
    Command, TurnInterrupts, format_history, format_outcome, format_stats, parse_command,
};
use crate::config::{AppConfig, FileConfig};
use crate::llm::provision::{AssistantSpec, ProvisionAction, provision_assistant};
use crate::llm::{OpenAIClient, RunDriver};
use crate::market::YahooFinance;
use crate::session::{ChatSession, SessionError};
use crate::tools::{ToolDispatcher, ToolSet};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "stock-assistant",
    version,
    about = "Chat about stock prices and history through a hosted assistant"
)]
pub struct Cli {
    /// OpenAI-compatible API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Model used when provisioning the assistant
    #[arg(long)]
    model: Option<String>,

    /// API key (set via env OPENAI_API_KEY recommended)
    #[arg(long)]
    api_key: Option<String>,

    /// Assistant to run against (env ASSISTANT_ID)
    #[arg(long)]
    assistant_id: Option<String>,

    /// Assistant name used by --provision
    #[arg(long)]
    assistant_name: Option<String>,

    /// Per-run instructions
    #[arg(long)]
    instructions: Option<String>,

    /// Delay between run status polls, e.g. 3s or 500ms
    #[arg(long)]
    poll_interval: Option<String>,

    /// Capabilities offered to the assistant
    #[arg(long, value_enum)]
    tools: Option<ToolSet>,

    /// Log level (error,warn,info,debug,trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Create or update the assistant, print its id and exit
    #[arg(long, action = ArgAction::SetTrue)]
    provision: bool,

    /// Send a single prompt, print the reply and exit
    #[arg(short, long)]
    prompt: Option<String>,
}

impl Cli {
    /// Flags as the highest-priority configuration layer.
    pub fn config_layer(&self) -> FileConfig {
        FileConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            assistant_id: self.assistant_id.clone(),
            assistant_name: self.assistant_name.clone(),
            instructions: self.instructions.clone(),
            poll_interval: self.poll_interval.clone(),
            tools: self.tools,
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
            ..FileConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut cfg = AppConfig::from_cli(&cli)?;
    logging::init_logging(&cfg.log_level, cfg.log_file.as_deref())?;
    info!(base_url=%cfg.base_url, model=%cfg.model, tools=?cfg.tools, poll_interval=?cfg.poll_interval, "app config");

    if cfg.api_key.is_none() {
        cfg.api_key = prompt_api_key()?;
    }
    let Some(api_key) = cfg.api_key.clone() else {
        bail!("no API key: pass --api-key, set OPENAI_API_KEY or add api_key to the config file");
    };

    let client = OpenAIClient::new(cfg.base_url.clone(), api_key)?.with_llm_config(&cfg.llm);
    let provider = YahooFinance::new(cfg.market.base_url.clone(), cfg.market_timeout())
        .context("build market data client")?;
    let dispatcher =
        ToolDispatcher::new(Arc::new(provider), cfg.tools).with_tool_timeout(cfg.tool_timeout());
    info!(tools=?dispatcher.registry().names(), "capabilities offered");

    if cli.provision {
        return run_provision(&cfg, &client, &dispatcher).await;
    }

    let Some(assistant_id) = cfg.assistant_id.clone() else {
        bail!(
            "no assistant id: pass --assistant-id, set ASSISTANT_ID, or run with --provision to create one"
        );
    };

    match cli.prompt.as_deref() {
        Some(prompt) => run_once(&cfg, &client, &dispatcher, &assistant_id, prompt).await,
        None => run_cli_loop(&cfg, &client, &dispatcher, &assistant_id).await,
    }
}

fn prompt_api_key() -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        return Ok(None);
    }
    print!("OpenAI API key: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let key = line.trim();
    Ok((!key.is_empty()).then(|| key.to_string()))
}

async fn run_provision(
    cfg: &AppConfig,
    client: &OpenAIClient,
    dispatcher: &ToolDispatcher,
) -> Result<()> {
    let spec = AssistantSpec::with_code_interpreter(
        cfg.assistant_name.clone(),
        prompts::SEED_PROMPT,
        cfg.model.clone(),
        dispatcher.registry().tool_defs(),
    );
    let provisioned = provision_assistant(client, &spec)
        .await
        .context("provision assistant")?;
    let verb = match provisioned.action {
        ProvisionAction::Created => "Created",
        ProvisionAction::Updated => "Updated",
    };
    eprintln!("{verb} assistant '{}'", cfg.assistant_name);
    println!("{}", provisioned.assistant.id);
    Ok(())
}

/// Progress lines from the run driver, printed off the async runtime.
fn spawn_progress_printer(rx: Receiver<String>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for line in rx {
            eprintln!("  {line}");
        }
    })
}

async fn send_turn(
    cfg: &AppConfig,
    session: &mut ChatSession<'_>,
    client: &OpenAIClient,
    dispatcher: &ToolDispatcher,
    interrupts: &TurnInterrupts,
    ui_tx: &Sender<String>,
    text: &str,
) -> Result<String, SessionError> {
    let driver = RunDriver::new(client)
        .with_poll_interval(cfg.poll_interval)
        .with_ui(ui_tx.clone())
        .with_cancel(interrupts.begin_turn());
    let result = session.send(&driver, dispatcher, text).await;
    interrupts.end_turn();
    result.map(|outcome| format_outcome(&outcome))
}

fn report_turn_error(e: &SessionError) {
    let cause = e.assistant_error();
    error!(error=%e, kind=?cause.kind(), "turn failed");
    if cause.is_transport() {
        eprintln!("Could not reach the assistant service: {e}");
    } else {
        eprintln!("{e}");
    }
}

async fn run_once(
    cfg: &AppConfig,
    client: &OpenAIClient,
    dispatcher: &ToolDispatcher,
    assistant_id: &str,
    prompt: &str,
) -> Result<()> {
    let (ui_tx, ui_rx) = channel();
    let printer = spawn_progress_printer(ui_rx);
    let interrupts = TurnInterrupts::default();
    interrupts.listen();

    let mut session =
        ChatSession::start(client, assistant_id, Some(cfg.instructions.clone())).await?;
    let reply =
        send_turn(cfg, &mut session, client, dispatcher, &interrupts, &ui_tx, prompt).await;
    session.end().await;

    drop(ui_tx);
    let _ = printer.join();
    println!("{}", reply?);
    Ok(())
}

async fn run_cli_loop(
    cfg: &AppConfig,
    client: &OpenAIClient,
    dispatcher: &ToolDispatcher,
    assistant_id: &str,
) -> Result<()> {
    let (ui_tx, ui_rx) = channel();
    let printer = spawn_progress_printer(ui_rx);

    let interrupts = TurnInterrupts::default();
    interrupts.listen();

    println!("stock-assistant - type /help for commands");
    let instructions = Some(cfg.instructions.clone());
    let mut session = ChatSession::start(client, assistant_id, instructions.clone()).await?;

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Some(Command::Quit) => break,
            Some(Command::Help) => cli::print_help(),
            Some(Command::Clear) => cli::clear_screen(),
            Some(Command::History) => println!("{}", format_history(&session.data)),
            Some(Command::Stats) => println!("{}", format_stats(&session.data)),
            Some(Command::New) => {
                let fresh = ChatSession::start(client, assistant_id, instructions.clone()).await?;
                let old = std::mem::replace(&mut session, fresh);
                old.end().await;
                println!("Started a new conversation.");
            }
            Some(Command::Unknown(cmd)) => eprintln!("unknown command {cmd}; try /help"),
            None => {
                match send_turn(cfg, &mut session, client, dispatcher, &interrupts, &ui_tx, line)
                    .await
                {
                    Ok(reply) => println!("{reply}"),
                    Err(e) => report_turn_error(&e),
                }
            }
        }
    }

    session.end().await;
    drop(ui_tx);
    let _ = printer.join();
    Ok(())
}
