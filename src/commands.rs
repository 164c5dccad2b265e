use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use crate::session::{SessionController, SessionState};
use crate::timeline::{random_color_tag, MarkerId};

pub enum CommandOutcome {
    Continue,
    Quit,
}

/// Execute one command line against the session, returning what to print.
pub fn execute_command(
    line: &str,
    session: &Arc<Mutex<SessionController>>,
    quit: &Arc<AtomicBool>,
) -> (CommandOutcome, String) {
    let cmd = line.trim();

    if cmd.eq_ignore_ascii_case("START") {
        let mut session = match session.lock() {
            Ok(s) => s,
            Err(_) => return (CommandOutcome::Quit, "ERROR session lost".into()),
        };
        match session.set_recording(true) {
            Ok(()) => (CommandOutcome::Continue, "STATUS RECORDING".into()),
            Err(e) => (CommandOutcome::Continue, format!("ERROR {}", e)),
        }
    } else if cmd.eq_ignore_ascii_case("STOP") {
        let mut session = match session.lock() {
            Ok(s) => s,
            Err(_) => return (CommandOutcome::Quit, "ERROR session lost".into()),
        };
        match session.set_recording(false) {
            Ok(()) => (CommandOutcome::Continue, "STATUS PAUSED".into()),
            Err(e) => (CommandOutcome::Continue, format!("ERROR {}", e)),
        }
    } else if let Some(arg) = cmd.strip_prefix("STOP_AFTER ") {
        match arg.trim().parse::<u64>() {
            Ok(secs) => {
                let session = Arc::clone(session);
                thread::spawn(move || {
                    thread::sleep(Duration::from_secs(secs));
                    if pause_by_timer(&session) {
                        println!("STATUS STOPPED_BY_TIMER ({}s)", secs);
                        io::stdout().flush().ok();
                    }
                });
                (
                    CommandOutcome::Continue,
                    format!("STATUS WILL STOP AFTER {}s", secs),
                )
            }
            Err(_) => (CommandOutcome::Continue, "ERROR bad STOP_AFTER arg".into()),
        }
    } else if let Some(label) = cmd.strip_prefix("MARK ") {
        let mut session = match session.lock() {
            Ok(s) => s,
            Err(_) => return (CommandOutcome::Quit, "ERROR session lost".into()),
        };
        match session.insert_marker(label.trim(), &random_color_tag()) {
            Ok(id) => {
                let timestamp = session
                    .markers()
                    .iter()
                    .find(|m| m.id == id)
                    .map(|m| m.timestamp)
                    .unwrap_or_default();
                (
                    CommandOutcome::Continue,
                    format!("MARKER {} @ {:.2}s", id, timestamp),
                )
            }
            Err(e) => (CommandOutcome::Continue, format!("ERROR {}", e)),
        }
    } else if let Some(arg) = cmd.strip_prefix("UNMARK ") {
        let mut session = match session.lock() {
            Ok(s) => s,
            Err(_) => return (CommandOutcome::Quit, "ERROR session lost".into()),
        };
        match arg.trim().parse::<MarkerId>() {
            Ok(id) => match session.remove_marker(id) {
                Ok(marker) => (
                    CommandOutcome::Continue,
                    format!("STATUS MARKER_REMOVED {}", marker.label),
                ),
                Err(e) => (CommandOutcome::Continue, format!("ERROR {}", e)),
            },
            Err(_) => (CommandOutcome::Continue, "ERROR bad marker id".into()),
        }
    } else if cmd.eq_ignore_ascii_case("MARKERS") {
        let session = match session.lock() {
            Ok(s) => s,
            Err(_) => return (CommandOutcome::Quit, "ERROR session lost".into()),
        };
        if session.markers().is_empty() {
            (CommandOutcome::Continue, "STATUS NO_MARKERS".into())
        } else {
            let lines: Vec<String> = session
                .markers()
                .iter()
                .map(|m| format!("MARKER {} @ {:.2}s {} {}", m.id, m.timestamp, m.color, m.label))
                .collect();
            (CommandOutcome::Continue, lines.join("\n"))
        }
    } else if cmd.eq_ignore_ascii_case("STATUS") {
        let session = match session.lock() {
            Ok(s) => s,
            Err(_) => return (CommandOutcome::Quit, "ERROR session lost".into()),
        };
        (
            CommandOutcome::Continue,
            format!(
                "STATUS {} device={} samples={} markers={}",
                session.state(),
                session.device_id().unwrap_or("<none>"),
                session.samples_recorded(),
                session.markers().len()
            ),
        )
    } else if cmd.eq_ignore_ascii_case("QUIT") {
        quit.store(true, Ordering::SeqCst);
        if let Ok(mut session) = session.lock() {
            // stop() fails only before arming, in which case there is
            // nothing to end
            let _ = session.stop();
        }
        (CommandOutcome::Quit, "STATUS QUIT".into())
    } else if cmd.is_empty() {
        (CommandOutcome::Continue, String::new())
    } else {
        (
            CommandOutcome::Continue,
            format!("ERROR unknown command: {}", cmd),
        )
    }
}

/// Timer body for STOP_AFTER: pause only if the session is still recording,
/// so an operator who already paused or quit gets no spurious status line.
fn pause_by_timer(session: &Mutex<SessionController>) -> bool {
    let Ok(mut session) = session.lock() else {
        return false;
    };
    session.state() == SessionState::Recording && session.set_recording(false).is_ok()
}

/// Read commands from stdin until QUIT or EOF.
pub fn handle_commands(
    session: Arc<Mutex<SessionController>>,
    quit: Arc<AtomicBool>,
) -> Result<()> {
    let stdin = io::stdin();
    for line_res in stdin.lock().lines() {
        match line_res {
            Ok(line) => {
                let (outcome, response) = execute_command(&line, &session, &quit);
                if !response.is_empty() {
                    println!("{}", response);
                    io::stdout().flush().ok();
                }
                if matches!(outcome, CommandOutcome::Quit) {
                    break;
                }
            }
            Err(e) => {
                eprintln!("stdin read error: {}", e);
                break;
            }
        }
    }
    Ok(())
}
