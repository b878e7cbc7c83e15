use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::llm::RunOutcome;
use crate::session::SessionData;

pub fn print_help() {
    println!(
        "/help     Show help\n/new      Start a new conversation thread\n/history  Show this conversation\n/stats    Show session statistics\n/clear    Clear screen\n/quit     Quit\nAnything else is sent to the assistant."
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    New,
    History,
    Stats,
    Clear,
    Quit,
    Unknown(String),
}

/// `None` when the line is a chat message rather than a slash command.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if !line.starts_with('/') {
        return None;
    }
    let word = line.split_whitespace().next().unwrap_or(line);
    Some(match word {
        "/help" => Command::Help,
        "/new" => Command::New,
        "/history" => Command::History,
        "/stats" => Command::Stats,
        "/clear" => Command::Clear,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    })
}

pub fn clear_screen() {
    print!("\x1B[2J\x1B[H");
    let _ = io::stdout().flush();
}

pub fn format_history(data: &SessionData) -> String {
    if data.transcript.is_empty() {
        return "(no messages yet)".to_string();
    }
    let mut out = String::new();
    for entry in &data.transcript {
        let _ = writeln!(out, "[{}] {}", entry.role, entry.text);
    }
    out.trim_end().to_string()
}

pub fn format_stats(data: &SessionData) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "session:    {}", data.meta.id);
    let _ = writeln!(out, "thread:     {}", data.meta.thread_id);
    let _ = writeln!(out, "started:    {}", data.meta.created_at);
    let _ = writeln!(out, "updated:    {}", data.timestamp);
    let _ = writeln!(out, "requests:   {}", data.requests);
    let _ = writeln!(out, "tool calls: {}", data.tool_calls);
    for (name, ok, failed) in data.tool_summary() {
        let _ = writeln!(out, "  {name}: {ok} ok, {failed} failed");
    }
    out.trim_end().to_string()
}

/// Text shown to the user for a finished turn.
pub fn format_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed { message, .. } => message.content.clone(),
        RunOutcome::Failed { status, error, .. } => match error {
            Some(e) => format!("Run {status}: {} ({})", e.message, e.code),
            None => format!("Run {status}."),
        },
    }
}

/// What a Ctrl-C means right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// A turn was running and has been cancelled.
    CancelledTurn,
    /// Nothing was running; the user wants out.
    Exit,
}

/// Routes Ctrl-C for the whole process. Only one signal listener exists; each
/// turn registers its token here for as long as it runs.
#[derive(Debug, Clone, Default)]
pub struct TurnInterrupts {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl TurnInterrupts {
    pub fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    pub fn end_turn(&self) {
        self.slot().take();
    }

    pub fn interrupt(&self) -> Interrupt {
        match self.slot().take() {
            Some(token) => {
                token.cancel();
                Interrupt::CancelledTurn
            }
            None => Interrupt::Exit,
        }
    }

    /// Install the Ctrl-C listener. Must be called from within the runtime.
    pub fn listen(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if this.interrupt() == Interrupt::Exit {
                    eprintln!();
                    std::process::exit(130);
                }
                eprintln!("  cancelling...");
            }
        });
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FinalMessage, RunError, RunStatus};
    use crate::session::Role;

    #[test]
    fn parses_slash_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command(" /help "), Some(Command::Help));
        assert_eq!(parse_command("/exit"), Some(Command::Quit));
        assert_eq!(parse_command("/stats now"), Some(Command::Stats));
        assert_eq!(
            parse_command("/map"),
            Some(Command::Unknown("/map".to_string()))
        );
    }

    #[test]
    fn history_lists_roles_in_order() {
        let mut data = SessionData::new("thread_1");
        assert_eq!(format_history(&data), "(no messages yet)");
        data.push(Role::User, "price of TSLA?");
        data.push(Role::Assistant, "Price: 242.50");
        assert_eq!(
            format_history(&data),
            "[user] price of TSLA?\n[assistant] Price: 242.50"
        );
    }

    #[test]
    fn stats_include_per_tool_counts() {
        let mut data = SessionData::new("thread_1");
        data.increment_requests();
        data.tool_call_successes.insert("get_stock_price".into(), 3);
        data.tool_calls = 3;
        let text = format_stats(&data);
        assert!(text.contains("thread:     thread_1"));
        assert!(text.contains("requests:   1"));
        assert!(text.contains(&format!("updated:    {}", data.timestamp)));
        assert!(text.contains("  get_stock_price: 3 ok, 0 failed"));
    }

    #[test]
    fn outcome_text() {
        let done = RunOutcome::Completed {
            message: FinalMessage {
                message_id: "m".into(),
                run_id: "r".into(),
                content: "hi".into(),
            },
            tool_calls: 0,
        };
        assert_eq!(format_outcome(&done), "hi");

        let failed = RunOutcome::Failed {
            run_id: "r".into(),
            status: RunStatus::Failed,
            error: Some(RunError {
                code: "server_error".into(),
                message: "boom".into(),
            }),
        };
        assert_eq!(format_outcome(&failed), "Run failed: boom (server_error)");

        let expired = RunOutcome::Failed {
            run_id: "r".into(),
            status: RunStatus::Expired,
            error: None,
        };
        assert_eq!(format_outcome(&expired), "Run expired.");
    }

    #[test]
    fn interrupt_cancels_running_turn_then_exits_when_idle() {
        let interrupts = TurnInterrupts::default();
        assert_eq!(interrupts.interrupt(), Interrupt::Exit);

        let token = interrupts.begin_turn();
        assert_eq!(interrupts.interrupt(), Interrupt::CancelledTurn);
        assert!(token.is_cancelled());
        // the turn has not ended yet, but its token is spent
        assert_eq!(interrupts.interrupt(), Interrupt::Exit);
    }

    #[test]
    fn finished_turn_is_not_cancelled() {
        let interrupts = TurnInterrupts::default();
        let first = interrupts.begin_turn();
        interrupts.end_turn();
        assert_eq!(interrupts.interrupt(), Interrupt::Exit);
        assert!(!first.is_cancelled());

        let second = interrupts.begin_turn();
        let clone = interrupts.clone();
        assert_eq!(clone.interrupt(), Interrupt::CancelledTurn);
        assert!(second.is_cancelled());
    }
}
