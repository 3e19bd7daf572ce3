mod display;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use verinews_client::{
    ClientConfig, HttpVerificationClient, VerificationService, http::DEFAULT_BASE_URL,
};
use verinews_core::ClaimId;
use verinews_pipeline::{
    DEFAULT_MAX_INPUT_CHARS, JsonFilePreferences, Orchestrator, PipelineConfig, PreferenceStore,
    SelectionController, Theme, prefs,
};

use crate::display::Style;

#[derive(Parser)]
#[command(name = "verinews", version, about = "Check the factual claims in a news article")]
struct Cli {
    /// Verification service root URL.
    #[arg(long, env = "VERINEWS_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "VERINEWS_TIMEOUT_SECS", default_value_t = 15, global = true)]
    timeout_secs: u64,

    /// Maximum article length in characters.
    #[arg(long, env = "VERINEWS_MAX_CHARS", default_value_t = DEFAULT_MAX_INPUT_CHARS, global = true)]
    max_chars: usize,

    /// Preference file (theme and other UI settings).
    #[arg(long, env = "VERINEWS_PREFS", default_value = ".verinews/prefs.json", global = true)]
    prefs: PathBuf,

    /// Log more (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Input {
    /// Article text. Read from --file or stdin when omitted.
    text: Option<String>,

    /// Read the article from a file.
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract and list the claims in an article.
    Analyze(Input),
    /// Extract claims and verify all of them.
    Check(Input),
    /// Step through claims interactively (n, p, s N, show, wait, r, q).
    Browse(Input),
    /// Check that the verification service is reachable and healthy.
    Health,
    /// Read or change stored preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("verinews v{}", env!("CARGO_PKG_VERSION"));

    let store = JsonFilePreferences::new(&cli.prefs);

    match &cli.command {
        Command::Analyze(input) => {
            let text = read_input(input, true).await?;
            let orchestrator = build_orchestrator(&cli)?;
            let outcome = orchestrator.analyze(&text).await?;
            display::print_outcome(&outcome);
        }
        Command::Check(input) => {
            let text = read_input(input, true).await?;
            let style = style(&store)?;
            let orchestrator = build_orchestrator(&cli)?;
            let outcome = orchestrator.analyze(&text).await?;
            display::print_outcome(&outcome);
            println!();
            for (claim, result) in orchestrator.verify_all().await {
                display::print_check_result(&claim, &result, style);
            }
        }
        Command::Browse(input) => {
            let text = read_input(input, false).await?;
            let style = style(&store)?;
            let orchestrator = build_orchestrator(&cli)?;
            browse(SelectionController::new(orchestrator), &text, style).await?;
        }
        Command::Health => {
            let client = build_client(&cli)?;
            client.health().await.context("health check failed")?;
            println!("{} is healthy", client.base_url());
        }
        Command::Prefs { action } => run_prefs(&store, action)?,
    }

    Ok(())
}

fn build_client(cli: &Cli) -> anyhow::Result<HttpVerificationClient> {
    HttpVerificationClient::new(ClientConfig {
        base_url: cli.base_url.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
        ..ClientConfig::default()
    })
    .context("building HTTP client")
}

fn build_orchestrator(cli: &Cli) -> anyhow::Result<Orchestrator> {
    Ok(Orchestrator::new(
        Arc::new(build_client(cli)?),
        PipelineConfig {
            max_input_chars: cli.max_chars,
        },
    ))
}

fn style(store: &dyn PreferenceStore) -> anyhow::Result<Style> {
    Ok(Style {
        theme: Theme::load(store).context("reading theme preference")?,
        color: std::io::stdout().is_terminal(),
    })
}

async fn read_input(input: &Input, allow_stdin: bool) -> anyhow::Result<String> {
    if let Some(text) = &input.text {
        return Ok(text.clone());
    }
    if let Some(path) = &input.file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()));
    }
    if !allow_stdin {
        bail!("pass the article as an argument or with --file; stdin is used for commands");
    }
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("reading article from stdin")?;
    Ok(text)
}

fn run_prefs(store: &dyn PreferenceStore, action: &PrefsAction) -> anyhow::Result<()> {
    match action {
        PrefsAction::Get { key } => match store.get(key)? {
            Some(value) => println!("{value}"),
            None => println!("(unset)"),
        },
        PrefsAction::Set { key, value } => {
            prefs::validate(key, value)?;
            store.set(key, value)?;
        }
        PrefsAction::Unset { key } => {
            store.remove(key)?;
        }
        PrefsAction::List => {
            for (key, value) in store.entries()? {
                println!("{key:<14} {value}");
            }
        }
    }
    Ok(())
}

const BROWSE_HELP: &str = "\
commands:
  n, next          select the next claim
  p, prev          select the previous claim
  s N, select N    select claim N
  show             show the selected claim now
  wait             wait for the selected claim to finish, then show it
  l, list          list claims
  r, reanalyze     run the analysis again
  q, quit          exit";

async fn browse(mut ctl: SelectionController, text: &str, style: Style) -> anyhow::Result<()> {
    let outcome = ctl.analyze(text).await?;
    display::print_outcome(&outcome);
    println!("{BROWSE_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading command")? {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            continue;
        };
        // Verifications run in the background; the handles are dropped on
        // purpose and results are read back from the cache.
        let step = match cmd {
            "n" | "next" => ctl.next().map(|h| h.is_some()),
            "p" | "prev" | "previous" => ctl.previous().map(|h| h.is_some()),
            "s" | "select" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
                Some(n) => ctl.select(ClaimId::from(n)).map(|_| true),
                None => {
                    println!("usage: select N");
                    continue;
                }
            },
            "show" => {
                display::print_display_state(&ctl.display_state(), style);
                continue;
            }
            "wait" => {
                display::print_display_state(&ctl.wait_settled().await, style);
                continue;
            }
            "l" | "list" => {
                for claim in ctl.orchestrator().claims() {
                    println!("  [{}] {}", claim.id, claim.text);
                }
                continue;
            }
            "r" | "reanalyze" => {
                match ctl.analyze(text).await {
                    Ok(outcome) => display::print_outcome(&outcome),
                    Err(e) => println!("analysis failed: {e}"),
                }
                continue;
            }
            "q" | "quit" | "exit" => break,
            "h" | "help" | "?" => {
                println!("{BROWSE_HELP}");
                continue;
            }
            other => {
                println!("unknown command {other:?}, try help");
                continue;
            }
        };

        // Let the spawned verification claim its record before showing it.
        tokio::task::yield_now().await;
        match step {
            Ok(true) => display::print_display_state(&ctl.display_state(), style),
            Ok(false) => println!("(no further claim in that direction)"),
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}
