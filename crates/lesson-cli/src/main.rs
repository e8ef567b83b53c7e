//! Lesson runner CLI
//!
//! Terminal host for interactive coding lessons: the learner edits the
//! workspace file with their own editor and drives runs, checks and
//! navigation from here.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use lesson_orchestrator::classify::transport_failure_message;
use lesson_orchestrator::events::drain;
use lesson_orchestrator::{
    CheckOutcome, CodeEditor, Collection, Config, FileEditor, FileStore, HostSeams, HttpBackend,
    InputCollector, InputPrompt, NavigationOutcome, PersistentStore, PresetCollector, RunOutcome,
    Session, StatusLevel, UiEvent,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{broadcast, Mutex};
use tracing_subscriber::EnvFilter;

/// Typed at an input prompt to abandon the run.
const CANCEL_COMMAND: &str = ":cancel";

/// Shell help text.
const SHELL_HELP: &str = "\
Commands:
  run          Run the workspace file
  rerun        Run the last interactive program again with new inputs
  check        Submit the workspace file as your answer
  next, prev   Move to the next or previous lesson
  goto NN      Open lesson NN
  show         Show the current lesson again
  progress     Show course progress
  reset        Forget all progress
  help         Show this help
  quit         Leave the shell";

/// Lesson runner - interactive coding lessons in the terminal
#[derive(Parser, Debug)]
#[command(name = "lesson")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: lesson.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Backend base URL, overriding the configuration
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Interactive shell (default)
    Shell,
    /// Show the current lesson
    Show,
    /// Open a lesson by its two-digit id
    Goto {
        /// Lesson id, e.g. 03
        lesson: String,
    },
    /// Open the next lesson
    Next,
    /// Open the previous lesson
    Prev,
    /// Run the workspace file
    Run {
        /// Answers for input() prompts, in order; prompts interactively when omitted
        #[arg(short, long = "input", value_name = "VALUE")]
        inputs: Vec<String>,
    },
    /// Check the workspace file against the current lesson
    Check,
    /// Show course progress
    Progress,
    /// Forget all progress and reopen the first lesson
    Reset,
    /// Check that the backend is reachable
    Health,
}

impl Command {
    /// Whether opening the session may replace the learner's workspace file.
    const fn replaces_workspace(&self) -> bool {
        matches!(self, Self::Goto { .. } | Self::Next | Self::Prev | Self::Reset)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run_cli(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Builds the session and dispatches the requested command.
async fn run_cli(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(ref api_url) = args.api_url {
        config.api_base_url.clone_from(api_url);
    }
    config.validate()?;

    let command = args.command.unwrap_or(Command::Shell);
    let stdin: SharedStdin = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));

    let collector: Arc<dyn InputCollector> = match &command {
        Command::Run { inputs } if !inputs.is_empty() => {
            Arc::new(PresetCollector::new(inputs.clone()))
        }
        _ => Arc::new(TerminalCollector::new(Arc::clone(&stdin))),
    };
    let editor = Arc::new(FileEditor::new(&config.workspace_file));
    let backend = Arc::new(HttpBackend::new(&config.api_base_url)?);
    let store = PersistentStore::new(FileStore::new(config.state_dir_path()));

    let session = Session::new(
        config,
        HostSeams {
            backend,
            store,
            editor: Arc::clone(&editor) as Arc<dyn CodeEditor>,
            collector,
        },
    );
    let mut events = session.events.subscribe();

    if matches!(command, Command::Health) {
        return Ok(check_health(&session).await);
    }

    open_session(&session, &editor, command.replaces_workspace()).await?;
    let opened = drain(&mut events);
    if matches!(command, Command::Shell | Command::Show) {
        render_events(&opened);
        println!("Edit your code in {}", editor.path().display());
    }

    let code = match command {
        Command::Shell => {
            shell(&session, &stdin, &mut events).await;
            ExitCode::SUCCESS
        }
        Command::Show | Command::Health => ExitCode::SUCCESS,
        other => {
            let code = execute(&session, &other).await?;
            render_events(&drain(&mut events));
            code
        }
    };
    Ok(code)
}

/// Restores progress and opens the current lesson.
///
/// Unless `replace_workspace` is set, code the learner already wrote survives
/// the starter code being loaded. An unreadable workspace file is reported
/// and left untouched.
async fn open_session(
    session: &Session,
    editor: &FileEditor,
    replace_workspace: bool,
) -> anyhow::Result<()> {
    let existing = if replace_workspace {
        String::new()
    } else {
        editor.read()?
    };
    session.start().await;
    if !existing.trim().is_empty() {
        editor.set_text(&existing);
    }
    Ok(())
}

/// Runs one non-shell command.
async fn execute(session: &Session, command: &Command) -> anyhow::Result<ExitCode> {
    let passed = match command {
        Command::Goto { lesson } => session.navigation.go_to_raw(lesson).await?.is_navigated(),
        Command::Next => session.navigation.go_next().await.is_navigated(),
        Command::Prev => session.navigation.go_previous().await.is_navigated(),
        Command::Run { .. } => session.orchestrator.run().await.is_success(),
        Command::Check => matches!(
            session.orchestrator.check().await,
            CheckOutcome::Correct { .. }
        ),
        Command::Progress => {
            println!("{}", session.progress_summary().await.label());
            true
        }
        Command::Reset => session.reset_progress().await.is_navigated(),
        Command::Shell | Command::Show | Command::Health => true,
    };
    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Reports backend health.
async fn check_health(session: &Session) -> ExitCode {
    let started = Instant::now();
    match session.health().await {
        Ok(health) => {
            println!(
                "Backend is {} ({})",
                health.status,
                health.service.as_deref().unwrap_or("unknown service")
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!(
                "{}",
                transport_failure_message("reach the backend", &e, started.elapsed())
            );
            ExitCode::from(1)
        }
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

// ============================================================================
// Shell
// ============================================================================

/// Line reader shared between the shell and the input collector.
type SharedLines<R> = Arc<Mutex<Lines<R>>>;

type SharedStdin = SharedLines<BufReader<Stdin>>;

/// Interactive command loop. Ends on `quit`, EOF or Ctrl+C.
async fn shell(
    session: &Session,
    stdin: &SharedStdin,
    events: &mut broadcast::Receiver<UiEvent>,
) {
    println!("Type `help` for commands.");
    loop {
        print_prompt("lesson> ");
        let line = tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            line = async { stdin.lock().await.next_line().await } => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read from stdin");
                break;
            }
        };

        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => continue,
            (Some("quit" | "exit"), _) => break,
            (Some("help"), _) => println!("{SHELL_HELP}"),
            (Some("run"), _) => report_run(&session.orchestrator.run().await),
            (Some("rerun"), _) => report_run(&session.orchestrator.rerun_with_new_inputs().await),
            (Some("check"), _) => {
                session.orchestrator.check().await;
            }
            (Some("next"), _) => report_navigation(&session.navigation.go_next().await),
            (Some("prev"), _) => report_navigation(&session.navigation.go_previous().await),
            (Some("goto"), Some(lesson)) => match session.navigation.go_to_raw(lesson).await {
                Ok(outcome) => report_navigation(&outcome),
                Err(e) => println!("{e}"),
            },
            (Some("goto"), None) => println!("Usage: goto NN"),
            (Some("show"), _) => show_current(session).await,
            (Some("progress"), _) => println!("{}", session.progress_summary().await.label()),
            (Some("reset"), _) => {
                session.reset_progress().await;
            }
            (Some(other), _) => println!("Unknown command: {other} (type `help`)"),
        }

        render_events(&drain(events));
    }
}

async fn show_current(session: &Session) {
    match session.loader.current().await {
        Some(content) => {
            println!("=== {} ===", content.title);
            println!("{}", content.problem_statement);
        }
        None => println!("No lesson loaded"),
    }
}

fn report_run(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Busy => println!("A run is already in progress"),
        RunOutcome::NothingToRerun => println!("Nothing to re-run yet; use `run` first"),
        _ => {}
    }
}

fn report_navigation(outcome: &NavigationOutcome) {
    if matches!(outcome, NavigationOutcome::Unchanged) {
        println!("Already at the edge of the course");
    }
}

fn print_prompt(prompt: &str) {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
}

// ============================================================================
// Rendering
// ============================================================================

/// Prints UI events the way a terminal shows panels.
fn render_events(events: &[UiEvent]) {
    for event in events {
        match event {
            UiEvent::Status(status) => {
                let tag = match status.level {
                    StatusLevel::Ready => "ready",
                    StatusLevel::Running => "running",
                    StatusLevel::Success => "ok",
                    StatusLevel::Error => "error",
                    StatusLevel::Info => "info",
                };
                tracing::debug!(level = tag, text = %status.text, "Status");
                if status.level != StatusLevel::Running {
                    println!("[{tag}] {}", status.text);
                }
            }
            UiEvent::Output(panel) if !panel.text.is_empty() => {
                println!("--- Output ---");
                println!("{}", panel.text);
            }
            UiEvent::Feedback(panel) if !panel.text.is_empty() => {
                println!("--- Feedback ---");
                println!("{}", panel.text);
            }
            UiEvent::Problem(problem) => {
                println!();
                println!("=== {} ===", problem.title);
                println!("{}", problem.markdown);
            }
            UiEvent::Progress(progress) => {
                println!(
                    "Progress: {}% Complete ({}/{} lessons)",
                    progress.percentage, progress.completed, progress.total
                );
            }
            UiEvent::Canvas(true) => println!("(this lesson has an interactive canvas)"),
            UiEvent::ClassDiagram(graph) if !graph.is_empty() => {
                println!("--- Classes ---");
                for node in &graph.nodes {
                    println!("  {node}");
                }
                for edge in &graph.edges {
                    println!("  {} -> {}", edge.child, edge.parent);
                }
            }
            UiEvent::RerunAvailable(true) => {
                println!("Tip: `rerun` runs the same program with different inputs");
            }
            UiEvent::Navigation(nav) => {
                let previous = if nav.previous_enabled {
                    nav.previous_label.clone()
                } else {
                    format!("({})", nav.previous_label)
                };
                let next = if nav.next_enabled {
                    nav.next_label.clone()
                } else {
                    format!("({})", nav.next_label)
                };
                println!("{previous} | Lesson {} | {next}", nav.current_lesson);
            }
            UiEvent::RunFinished(finished) => {
                tracing::debug!(
                    success = finished.success,
                    elapsed_ms = finished.elapsed_ms,
                    "Run finished"
                );
            }
            _ => {}
        }
    }
}

// ============================================================================
// TerminalCollector
// ============================================================================

/// Reads one line per prompt. EOF or `:cancel` cancels the run.
struct TerminalCollector<R> {
    lines: SharedLines<R>,
}

impl<R> TerminalCollector<R> {
    const fn new(lines: SharedLines<R>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl<R> InputCollector for TerminalCollector<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn collect(&self, prompts: &[InputPrompt]) -> Collection {
        println!(
            "This program asks for {} input(s). Type {CANCEL_COMMAND} to cancel.",
            prompts.len()
        );
        let mut lines = self.lines.lock().await;
        let mut answers = Vec::with_capacity(prompts.len());

        for prompt in prompts {
            print_prompt(&prompt.prompt_text);
            match lines.next_line().await {
                Ok(Some(line)) if line.trim() == CANCEL_COMMAND => return Collection::Cancelled,
                Ok(Some(line)) => answers.push(line),
                Ok(None) => return Collection::Cancelled,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read input");
                    return Collection::Cancelled;
                }
            }
        }

        Collection::Submitted(answers)
    }
}
