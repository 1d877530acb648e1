mod config;
mod console;
mod platform;

use crate::config::Config;
use crate::console::Action;
use crate::platform::NativePlatform;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use interview_core::backend::{BackendClient, BackendConfig, InterviewBackend};
use interview_core::notice::Notice;
use interview_core::session_state::{ControllerOptions, InterviewController};
use interview_core::speech_input::RecognitionConfig;
use interview_core::{NoticeSink, SessionError, detect};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Practice AI/ML interview questions from the terminal")]
struct Cli {
    /// Backend base URL, overriding INTERVIEW_BACKEND_URL
    #[arg(long)]
    backend_url: Option<String>,
    /// Never read questions aloud
    #[arg(long)]
    no_narration: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the backend's view of the current interview and exit
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    if cli.no_narration {
        config.narration.auto_narrate = false;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    tracing::info!(backend = %config.backend_url, mode = ?config.api_mode, "Configuration loaded");

    let backend = BackendClient::new(BackendConfig {
        base_url: config.backend_url.clone(),
    });

    if let Some(Command::Status) = cli.command {
        let status = backend
            .interview_status()
            .await
            .context("Failed to fetch interview status")?;
        print!("{}", console::status(&status));
        return Ok(());
    }

    // --- 3. Detect Host Capabilities ---
    let host = if cli.no_narration {
        NativePlatform::silent()
    } else {
        NativePlatform::detect()
    };
    if let Some(narrator) = host.narrator() {
        tracing::debug!(program = narrator.program(), "Narration enabled");
    }
    let platform = detect(&host);

    // --- 4. Wire the Controller ---
    let (notices, notice_rx) = NoticeSink::channel();
    let options = ControllerOptions {
        recognition: RecognitionConfig {
            lang: config.narration.lang.clone(),
            restart_interval: config.recognition_restart,
        },
        narration: config.narration.clone(),
    };
    let controller = InterviewController::new(backend, platform, options, notices);
    let printer = tokio::spawn(print_notices(notice_rx));

    if let Some(notice) = controller.capabilities().compatibility_notice() {
        println!("{notice}");
    }
    println!("{}", console::HELP);

    let outcome = run(&controller).await;

    controller.shutdown();
    drop(controller);
    printer.abort();
    outcome
}

async fn print_notices(mut rx: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = rx.recv().await {
        println!("! {}", notice.message);
    }
}

async fn run(controller: &InterviewController<BackendClient>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let Some(action) = Action::parse(&line) else {
            continue;
        };

        match action {
            Action::Quit => break,
            Action::Help => println!("{}", console::HELP),
            Action::Start => match controller.start().await {
                Ok(()) => show_question(controller),
                Err(err) => explain(err),
            },
            Action::Submit => match controller.submit().await {
                Ok(result) => println!("{}", console::result(&result)),
                Err(err) => explain(err),
            },
            Action::Continue => match controller.continue_interview() {
                Ok(()) => show_question(controller),
                Err(err) => explain(err),
            },
            Action::End => match controller.end().await {
                Ok(summary) => print!("{}", console::summary(&summary)),
                Err(err) => explain(err),
            },
            Action::Status => match controller.fetch_status().await {
                Ok(status) => print!("{}", console::status(&status)),
                Err(err) => println!("Could not fetch the interview status: {err}"),
            },
            Action::Narrate => controller.narrate_question(),
            Action::Hush => controller.stop_narration(),
            Action::Microphone => {
                if let Ok(recording) = controller.toggle_recording() {
                    println!("Speech input {}.", if recording { "on" } else { "off" });
                }
            }
            Action::Camera(wanted) => {
                let enable = wanted.unwrap_or(!controller.camera_state().enabled);
                if let Ok(state) = controller.set_camera(enable).await {
                    println!("Camera {}.", if state.enabled { "on" } else { "off" });
                }
            }
            Action::Clear => controller.edit_answer(""),
            Action::Answer(text) => {
                if !controller.controls().edit_answer {
                    println!("Type /start to begin, or /continue for the next question.");
                    continue;
                }
                let mut answer = controller.answer();
                if !answer.is_empty() {
                    answer.push('\n');
                }
                answer.push_str(&text);
                controller.edit_answer(answer);
            }
            Action::Unknown(input) => println!("Unknown command {input}. Type /help for a list."),
        }
    }
    Ok(())
}

fn show_question(controller: &InterviewController<BackendClient>) {
    let session = controller.snapshot();
    print!(
        "{}",
        console::question(session.round_number, &session.current_question)
    );
}

/// Backend failures and empty answers arrive as notices; the rest are
/// explained here.
fn explain(err: SessionError) {
    match err {
        SessionError::InvalidState { action, state } => {
            println!("Cannot {action} while the interview is {state:?}.");
        }
        SessionError::Busy => println!("Still waiting for the backend."),
        other => tracing::debug!("{other}"),
    }
}
