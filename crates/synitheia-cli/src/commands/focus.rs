//! Interactive focus session.
//!
//! Commands are read line by line from stdin and fed to the focus driver.
//! Events are printed to stdout as JSON lines; notifications go to stderr.
//! Visibility and exclusive display are simulated with `hide`/`show` and
//! `leave`/`enter`.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use synitheia_core::focus::{
    motivational_message, Collaborators, FocusDriver, FocusInput, FocusSession, FocusSettings,
};
use synitheia_core::{FocusSnapshot, SessionType};
use tokio::sync::{broadcast, mpsc, watch};

use super::{CliResult, Context};
use crate::terminal::SimulatedDisplay;

#[derive(Args)]
pub struct FocusArgs {
    /// Habit to check in when a focus session completes
    #[arg(long)]
    habit: Option<String>,
    /// Number of focus sessions before the continue prompt
    #[arg(long)]
    sessions: Option<u32>,
    /// Milliseconds per timer second
    #[arg(long, default_value_t = 1000, hide = true)]
    tick_ms: u64,
}

const HELP: &str = "\
commands:
  start                 start the focus session
  play | pause          start or pause the countdown
  focus | short | long  switch session type
  hide | show           the window loses or regains visibility
  leave | enter         leave or re-enter fullscreen
  confirm | cancel      answer the exit confirmation
  resume                resume after a break, in fullscreen
  resume-windowed       resume after a break without fullscreen (penalty)
  more | finish         continue with another session or stop
  habit <id|none>       habit to check in on completion
  duration <focus|short|long> <minutes>
  sessions <n>
  reset | status | help | quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Input(FocusInput),
    Display(bool),
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".into());
    };
    let arg = words.next();

    let input = match head {
        "start" => FocusInput::Start,
        "play" => FocusInput::StartTimer,
        "pause" => FocusInput::PauseTimer,
        "focus" => FocusInput::SelectSession(SessionType::Focus),
        "short" => FocusInput::SelectSession(SessionType::ShortBreak),
        "long" => FocusInput::SelectSession(SessionType::LongBreak),
        "hide" => FocusInput::VisibilityChanged { visible: false },
        "show" => FocusInput::VisibilityChanged { visible: true },
        "confirm" => FocusInput::ConfirmExit,
        "cancel" => FocusInput::CancelExit,
        "resume" => FocusInput::ResumeWithExclusiveDisplay,
        "resume-windowed" => FocusInput::ContinueWithoutExclusiveDisplay,
        "more" => FocusInput::ContinueSessions,
        "finish" => FocusInput::FinishSessions,
        "reset" => FocusInput::Reset,
        "habit" => match arg {
            None | Some("none") => FocusInput::SelectHabit(None),
            Some(id) => FocusInput::SelectHabit(Some(id.to_string())),
        },
        "duration" => {
            let session = match arg {
                Some("focus") => SessionType::Focus,
                Some("short") => SessionType::ShortBreak,
                Some("long") => SessionType::LongBreak,
                _ => return Err("usage: duration <focus|short|long> <minutes>".into()),
            };
            let minutes = words
                .next()
                .and_then(|m| m.parse().ok())
                .ok_or("usage: duration <focus|short|long> <minutes>")?;
            FocusInput::SetDuration { session, minutes }
        }
        "sessions" => {
            let n = arg
                .and_then(|n| n.parse().ok())
                .ok_or("usage: sessions <n>")?;
            FocusInput::SetTotalSessions(n)
        }
        "leave" => return Ok(Command::Display(false)),
        "enter" => return Ok(Command::Display(true)),
        "status" => return Ok(Command::Status),
        "help" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Command::Input(input))
}

pub fn run(args: FocusArgs, user: Option<String>) -> CliResult {
    let ctx = Context::load(user)?;
    let mut settings = FocusSettings::from(&ctx.config);
    if let Some(n) = args.sessions {
        settings.total_sessions = n.max(1);
    }

    let display = Arc::new(SimulatedDisplay::default());
    let habits = Arc::new(ctx.habits());
    let ledger = habits.ledger().clone();
    let mut session = FocusSession::new(
        settings,
        ctx.user.clone(),
        Collaborators {
            notifier: ctx.notifier(),
            display: display.clone(),
            habits,
            ledger,
        },
    );
    if args.habit.is_some() {
        session.handle(FocusInput::SelectHabit(args.habit));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let driver =
            FocusDriver::spawn_with_period(session, Duration::from_millis(args.tick_ms.max(1)));
        let printer = tokio::spawn(print_events(driver.subscribe()));

        eprintln!("{HELP}");
        let inputs = driver.sender();
        let snapshots = driver.snapshots();
        let reader =
            tokio::task::spawn_blocking(move || read_commands(inputs, snapshots, display));
        if let Err(e) = reader.await {
            tracing::warn!("command reader failed: {e}");
        }

        let session = driver.shutdown().await?;
        // Printer ends once the driver's event channel closes.
        if let Err(e) = printer.await {
            tracing::warn!("event printer failed: {e}");
        }
        println!("{}", serde_json::to_string(&session.snapshot())?);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn read_commands(
    inputs: mpsc::Sender<FocusInput>,
    snapshots: watch::Receiver<FocusSnapshot>,
    display: Arc<SimulatedDisplay>,
) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let input = match parse_command(&line) {
            Ok(Command::Input(input)) => input,
            Ok(Command::Display(active)) => {
                display.set_active(active);
                FocusInput::DisplayChanged { active }
            }
            Ok(Command::Status) => {
                let snap = snapshots.borrow().clone();
                eprintln!(
                    "{} {} | {}",
                    snap.session_type,
                    snap.clock_text(),
                    motivational_message(snap.session_type)
                );
                match serde_json::to_string(&snap) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!("could not encode snapshot: {e}"),
                }
                continue;
            }
            Ok(Command::Help) => {
                eprintln!("{HELP}");
                continue;
            }
            Ok(Command::Quit) => break,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        if inputs.blocking_send(input).is_err() {
            break;
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<synitheia_core::FocusEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!("could not encode event: {e}"),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "event output fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
