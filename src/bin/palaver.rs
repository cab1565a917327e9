//! Interactive chat with any OpenAI-compatible backend.
//!
//! # Usage
//!
//! ```bash
//! # Use ./config.yaml
//! palaver
//!
//! # Start on another provider, showing error causes
//! palaver --config ~/.config/palaver.yaml --provider ollama --debug
//!
//! # Disable colors (useful for piping output)
//! palaver --no-color
//! ```
//!
//! Type `/?` at the prompt for the list of commands.

use std::process::ExitCode;
use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_subscriber::EnvFilter;

use palaver::HttpCompletionClient;
use palaver::chat::{
    ChatArgs, ChatConfig, ChatSession, Interrupt, PlainTextRenderer, Renderer, complete_command,
};

const PROMPT: &str = ">>> ";

/// Completes slash command names.
struct CommandHelper;

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let candidates = complete_command(&line[..pos])
            .into_iter()
            .map(|command| Pair {
                display: command.to_string(),
                replacement: command.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;
}

impl Highlighter for CommandHelper {}

impl Validator for CommandHelper {}

fn init_tracing(debug: bool) {
    let default = if debug { "palaver=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

/// Main entry point for the palaver application.
#[tokio::main]
async fn main() -> ExitCode {
    let (args, _) = ChatArgs::from_command_line_relaxed("palaver [OPTIONS]");
    let mut renderer = PlainTextRenderer::with_color(!args.no_color);

    let config_path = args.config_path();
    let config = ChatConfig::from_file(&config_path).and_then(|mut config| {
        config.apply_args(&args)?;
        Ok(config)
    });
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            renderer.print_error(&format!(
                "could not load {}: {err}",
                config_path.display()
            ));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.debug);
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let client = match HttpCompletionClient::new() {
        Ok(client) => client,
        Err(err) => {
            renderer.print_error(&err.to_string());
            return ExitCode::FAILURE;
        }
    };
    let interrupt = Arc::new(Interrupt::new());
    let mut session = match ChatSession::open(&config, client, &mut renderer) {
        Ok(session) => session.with_interrupt(Arc::clone(&interrupt)),
        Err(err) => {
            renderer.print_error(&err.to_string());
            return ExitCode::FAILURE;
        }
    };

    // The line editor reads Ctrl+C itself, so a signal here either lands
    // during a response or between turns; between turns it ends the process.
    let handler_interrupt = Arc::clone(&interrupt);
    if let Err(err) = ctrlc::set_handler(move || {
        if !handler_interrupt.trigger() {
            std::process::exit(0);
        }
    }) {
        renderer.print_error(&format!("could not install Ctrl+C handler: {err}"));
        return ExitCode::FAILURE;
    }

    let mut rl = match Editor::<CommandHelper, DefaultHistory>::new() {
        Ok(rl) => rl,
        Err(err) => {
            renderer.print_error(&format!("could not start line editor: {err}"));
            return ExitCode::FAILURE;
        }
    };
    rl.set_helper(Some(CommandHelper));

    renderer.print_value("Provider / model", session.conversation().model());
    renderer.print_notice("Send a message (/? for help)");

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.trim());
                }
                let outcome = session.handle_line(&line, &mut renderer).await;
                if outcome.is_exit() {
                    return ExitCode::from(outcome.exit_code());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                return ExitCode::SUCCESS;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                return ExitCode::FAILURE;
            }
        }
    }
}
