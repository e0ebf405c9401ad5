//! Backend process plumbing.
//!
//! # Structure
//!
//! - `launch` - spawn the backend with captured output and no console window
//! - `LineBuffer` / stream readers - turn raw output chunks into lines
//! - `parse_port_announcement` - recognise the `PORT:<n>` marker
//! - `BackendLogBuffer` - recent output lines for display
//! - `shutdown` - termination signals and exit descriptions

mod announce;
mod launcher;
mod line_buffer;
mod logs;
pub mod shutdown;
mod stream;

pub use announce::{PORT_ANNOUNCEMENT_PREFIX, parse_port_announcement};
pub use launcher::{LaunchedProcess, launch};
pub use line_buffer::LineBuffer;
pub use logs::{BackendLogBuffer, BackendLogEntry, OutputStream};
pub use shutdown::{ExitInfo, request_graceful_exit};
pub(crate) use stream::spawn_stream_reader;
