use std::io;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{event, Level};

/// `program arg...`, for messages.
pub fn describe(command: &Command) -> String {
    let std = command.as_std();
    std::iter::once(std.get_program())
        .chain(std.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `command` to completion, killing it if it takes longer than
/// `timeout`.
pub async fn output(mut command: Command, timeout: Duration) -> io::Result<Output> {
    let description = describe(&command);
    event!(Level::DEBUG, command = %description, "Running command");
    command.kill_on_drop(true);
    match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("`{description}` did not finish within {timeout:?}"),
        )),
    }
}

/// A one-line reason for a failed command.
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        format!("exited with {}: {stderr}", output.status)
    }
}
