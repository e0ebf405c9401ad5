//! Async output readers for the backend's stdout and stderr.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

use super::line_buffer::LineBuffer;
use super::logs::OutputStream;

const READ_CHUNK_BYTES: usize = 4096;

/// Read `stream` to EOF on its own task, handing every complete line to
/// `on_line` in order.
pub fn spawn_stream_reader<R, F>(
    mut stream: R,
    pid: u32,
    kind: OutputStream,
    mut on_line: F,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LineBuffer::new();
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];

        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break, // EOF
                Ok(n) => {
                    for line in lines.push(&chunk[..n]) {
                        on_line(line);
                    }
                }
                Err(e) => {
                    debug!(pid = %pid, stream = %kind, error = %e, "output reader exiting due to read error");
                    break;
                }
            }
        }

        if let Some(line) = lines.finish() {
            on_line(line);
        }

        debug!(pid = %pid, stream = %kind, "output reader task exiting");
    })
}
