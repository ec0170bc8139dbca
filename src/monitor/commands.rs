//! Text commands accepted on the monitor socket.

use crate::monitor::frames::ServerFrame;

const STATUS_REPORT: &str = "All systems operational. AI Core: ONLINE. Database: CONNECTED.";

/// Characters stripped from an echo command ("echo ")
const ECHO_OFFSET: usize = 5;

/// Reply to one inbound text frame
pub fn respond(input: &str) -> ServerFrame {
    match input {
        "ping" => ServerFrame::Pong,
        "status" => ServerFrame::terminal(STATUS_REPORT),
        _ if input.starts_with("echo") => {
            ServerFrame::terminal(input.chars().skip(ECHO_OFFSET).collect::<String>())
        }
        _ => ServerFrame::terminal(format!("Unknown command: {}", input)),
    }
}
