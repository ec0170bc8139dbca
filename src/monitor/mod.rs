//! Live system monitor over WebSocket.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `registry` | Open connections and fan-out |
//! | `session` | Per-socket reader/writer lifecycle |
//! | `commands` | `ping` / `status` / `echo` replies |
//! | `telemetry` | Simulated stats and request logs |
//! | `ticker` | Fixed-interval broadcast loop |
//! | `frames` | JSON frame types |

pub mod commands;
pub mod frames;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod ticker;

pub use frames::{LogEvent, ServerFrame, TelemetrySample};
pub use registry::{BroadcastReport, Connection, ConnectionId, ConnectionRegistry};
pub use session::run_session;
pub use telemetry::TelemetryGenerator;
pub use ticker::spawn_telemetry_ticker;
