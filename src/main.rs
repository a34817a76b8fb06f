//! ticketlens CLI — a minimal chat REPL over the agent session.
//!
//! The presentation layer is deliberately thin: it reads a line, hands it
//! to the session, prints the answer, and renders any escaping error as
//! an assistant-style error message so the conversation never stalls.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use chrono::Local;

use ticketlens::agent::AgentSession;
use ticketlens::dataset::load_csv;
use ticketlens::inference::backend::{ChatBackend, TokenSink};
use ticketlens::inference::config::resolve_model_config;

/// Sink that prints tokens to stdout as they arrive, keeping a copy so
/// the REPL can tell whether the final answer was already shown.
struct StdoutSink {
    seen: Mutex<String>,
}

impl StdoutSink {
    fn new() -> Self {
        Self {
            seen: Mutex::new(String::new()),
        }
    }

    fn already_printed(&self, answer: &str) -> bool {
        !answer.is_empty() && self.seen.lock().unwrap().ends_with(answer)
    }
}

impl TokenSink for StdoutSink {
    fn emit(&self, token: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
        self.seen.lock().unwrap().push_str(token);
    }
}

/// Parsed command-line options.
struct Options {
    data: PathBuf,
    config: Option<PathBuf>,
    mode: String,
    stream: bool,
}

fn parse_args() -> Result<Options> {
    let mut data: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut mode = "react".to_string();
    let mut stream = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data" => {
                data = Some(PathBuf::from(
                    args.next().context("--data requires a path")?,
                ));
            }
            "--config" => {
                config = Some(PathBuf::from(
                    args.next().context("--config requires a path")?,
                ));
            }
            "--mode" => {
                mode = args.next().context("--mode requires a value")?;
            }
            "--stream" => stream = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other} (try --help)"),
        }
    }

    let data = match data {
        Some(path) => path,
        None => PathBuf::from(
            std::env::var("TICKETLENS_DATA")
                .context("no dataset given: pass --data <csv> or set TICKETLENS_DATA")?,
        ),
    };

    Ok(Options {
        data,
        config,
        mode,
        stream,
    })
}

fn print_usage() {
    println!(
        "ticketlens — chat with a support-ticket dataset\n\
         \n\
         USAGE:\n\
         \x20   ticketlens --data <tickets.csv> [--config <ticketlens.yaml>]\n\
         \x20              [--mode react|planning] [--stream]\n\
         \n\
         In the REPL: type a question and press Enter. Commands:\n\
         \x20   /history   show the conversation so far\n\
         \x20   /quit      exit"
    );
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ticketlens=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Print the transcript with timestamps, tool turns included.
fn print_history<B: ChatBackend>(session: &AgentSession<B>) {
    for entry in session.conversation().entries() {
        let time = entry.recorded_at.with_timezone(&Local).format("%H:%M:%S");
        let role = format!("{:?}", entry.message.role).to_lowercase();
        let content = entry.message.content.as_deref().unwrap_or("");
        let calls = entry
            .message
            .tool_calls
            .as_ref()
            .map(|tc| {
                let names: Vec<&str> =
                    tc.iter().map(|c| c.function.name.as_str()).collect();
                format!(" [calls: {}]", names.join(", "))
            })
            .unwrap_or_default();
        println!("[{time}] {role}:{calls} {content}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let options = parse_args()?;

    let table = Arc::new(load_csv(&options.data)?);
    println!(
        "Loaded {} tickets ({} categories, {} intents).",
        table.len(),
        table.categories().len(),
        table.intents().len()
    );

    let config = resolve_model_config(options.config.as_deref())?;
    let mut session = AgentSession::new(config, table)?;

    println!(
        "Mode: {} (streaming {}). Type a question, /history, or /quit.",
        options.mode,
        if options.stream { "on" } else { "off" }
    );

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "/quit" | "/exit" => break,
            "/history" => {
                print_history(&session);
                continue;
            }
            _ => {}
        }

        let sink = StdoutSink::new();
        let result = session
            .run_with_sink(input, &options.mode, options.stream, &sink)
            .await;

        match result {
            Ok(answer) => {
                if sink.already_printed(&answer) {
                    // Streamed tokens are on screen; just end the line.
                    println!();
                } else {
                    println!("{answer}");
                }
            }
            Err(e) => {
                // Render as an assistant-style error so the REPL keeps going.
                println!("Error fetching response: {e}");
            }
        }
    }

    Ok(())
}
