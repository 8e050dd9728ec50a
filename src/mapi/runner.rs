/*!
Process execution with streamed, bounded output capture.

`ProcessRunner::execute` spawns an `Invocation` with stdout and stderr both
attached to one pipe, so lines arrive in the order the process wrote them. Each
line is logged as it arrives, only the last `TAIL_LINES` are kept, then the exit
status is collected.

A non-zero exit is an outcome (`success = false`), not an error. Launch
failures and timeouts are errors.
*/

use std::io::{self, BufRead, BufReader, PipeReader, Read};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{Semaphore, mpsc};

use super::command::Invocation;
use crate::utils::LineTail;

/// Lines of output retained per invocation.
pub const TAIL_LINES: usize = 50;

/// Longer lines are split into chunks of this many bytes.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

const LINE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("i/o error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("process runner is closed")]
    Closed,
}

/// Result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Last `TAIL_LINES` lines, newline separated.
    pub output: String,
    /// Lines that were produced but not retained.
    pub dropped_lines: usize,
}

impl RunOutcome {
    /// Output prefixed with the label matching the exit status.
    pub fn labeled(&self, success_label: &str, failure_label: &str) -> String {
        if self.success {
            self.prefixed(success_label)
        } else {
            self.prefixed(failure_label)
        }
    }

    /// `label`, then the output on the following lines if there is any.
    pub fn prefixed(&self, label: &str) -> String {
        if self.output.is_empty() {
            label.to_string()
        } else {
            format!("{label}\n{}", self.output)
        }
    }
}

/// Spawns scanner processes, bounded by a concurrency limit and an optional timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    permits: Arc<Semaphore>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>, max_concurrent: usize) -> Self {
        Self {
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn execute(&self, invocation: &Invocation) -> Result<RunOutcome, RunnerError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RunnerError::Closed)?;

        let program = invocation.program().display().to_string();
        tracing::info!("Running: {invocation}");

        let io_err = |source: io::Error| RunnerError::Io {
            program: program.clone(),
            source,
        };
        let (reader, writer) = io::pipe().map_err(io_err)?;
        let stderr_writer = writer.try_clone().map_err(io_err)?;

        let mut command = Command::new(invocation.program());
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        let spawned = command.spawn();
        // The command holds the parent's write ends; the reader sees EOF only
        // once they are closed.
        drop(command);
        let mut child = spawned.map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

        let captured = match self.timeout {
            None => capture(&mut child, reader).await,
            Some(after) => {
                let waited = tokio::time::timeout(after, capture(&mut child, reader)).await;
                match waited {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(%program, timeout_s = after.as_secs(), "timed out, killing process");
                        if let Err(e) = child.kill().await {
                            tracing::debug!(%program, "kill after timeout failed: {e}");
                        }
                        return Err(RunnerError::Timeout {
                            program: program.clone(),
                            after,
                        });
                    }
                }
            }
        };

        let (status, tail) = captured.map_err(io_err)?;

        let outcome = RunOutcome {
            success: status.success(),
            exit_code: status.code(),
            output: tail.join(),
            dropped_lines: tail.dropped(),
        };
        if outcome.success {
            tracing::info!(%program, lines = tail.seen(), "process finished");
        } else {
            tracing::warn!(%program, code = ?outcome.exit_code, lines = tail.seen(), "process failed");
        }
        Ok(outcome)
    }
}

/// Drain the merged output pipe into a tail, then reap the child.
async fn capture(child: &mut Child, output: PipeReader) -> io::Result<(ExitStatus, LineTail)> {
    let (tx, mut rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
    let reader = tokio::task::spawn_blocking(move || forward_lines(output, tx));

    let mut tail = LineTail::new(TAIL_LINES);
    while let Some(line) = rx.recv().await {
        tracing::info!(target: "mapi", "{line}");
        tail.push(line);
    }
    if let Err(e) = reader.await {
        tracing::warn!("output reader task failed: {e}");
    }

    let status = child.wait().await?;
    Ok((status, tail))
}

/// Blocking: sends each line of `output` until EOF or until the receiver is gone.
fn forward_lines<R: Read>(output: R, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut buf) {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.blocking_send(line).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("reading process output failed: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("/bin/sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn keeps_only_last_fifty_lines() {
        let runner = ProcessRunner::new(None, 1);
        let outcome = runner
            .execute(&sh("i=1; while [ $i -le 120 ]; do echo line $i; i=$((i+1)); done"))
            .await
            .unwrap();
        assert!(outcome.success);
        let lines: Vec<_> = outcome.output.lines().collect();
        assert_eq!(lines.len(), TAIL_LINES);
        assert_eq!(lines.first(), Some(&"line 71"));
        assert_eq!(lines.last(), Some(&"line 120"));
        let expected: Vec<String> = (71..=120).map(|i| format!("line {i}")).collect();
        assert_eq!(lines, expected);
        assert!(!outcome.output.contains("line 70\n"));
        assert_eq!(outcome.dropped_lines, 70);
    }

    #[tokio::test]
    async fn stderr_is_captured() {
        let runner = ProcessRunner::new(None, 1);
        let outcome = runner
            .execute(&sh("echo to-stdout; echo to-stderr 1>&2"))
            .await
            .unwrap();
        assert_eq!(outcome.output, "to-stdout\nto-stderr");
    }

    #[tokio::test]
    async fn interleaved_streams_keep_write_order() {
        let runner = ProcessRunner::new(None, 1);
        let outcome = runner
            .execute(&sh(
                "i=1; while [ $i -le 60 ]; do echo out $i; echo err $i 1>&2; i=$((i+1)); done",
            ))
            .await
            .unwrap();
        let lines: Vec<_> = outcome.output.lines().collect();
        let expected: Vec<String> = (36..=60)
            .flat_map(|i| [format!("out {i}"), format!("err {i}")])
            .collect();
        assert_eq!(lines, expected);
        assert_eq!(outcome.dropped_lines, 70);
    }

    #[tokio::test]
    async fn overlong_line_is_split() {
        let runner = ProcessRunner::new(None, 1);
        let outcome = runner
            .execute(&sh("head -c 300000 /dev/zero | tr '\\0' a; echo end"))
            .await
            .unwrap();
        let lines: Vec<_> = outcome.output.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| l.len() as u64 <= MAX_LINE_BYTES));
        assert!(lines[4].ends_with("aend"), "{}", &lines[4][lines[4].len() - 8..]);
        let total: usize = lines.iter().map(|l| l.len()).sum();
        assert_eq!(total, 300_000 + "end".len());
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let runner = ProcessRunner::new(None, 1);
        let outcome = runner.execute(&sh("echo boom; exit 3")).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.labeled("X output:", "X failed:"), "X failed:\nboom");

        let ok = runner.execute(&sh("echo fine")).await.unwrap();
        assert_eq!(ok.labeled("X output:", "X failed:"), "X output:\nfine");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let runner = ProcessRunner::new(None, 1);
        let err = runner
            .execute(&Invocation::new("/nonexistent/mapi-binary", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }), "{err}");
    }

    #[tokio::test]
    async fn timeout_kills_process() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(200)), 1);
        let started = std::time::Instant::now();
        let err = runner.execute(&sh("echo start; exec sleep 10")).await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_utf8_is_lossy() {
        let runner = ProcessRunner::new(None, 1);
        let outcome = runner.execute(&sh(r"printf 'ok\377\n'")).await.unwrap();
        assert!(outcome.output.starts_with("ok"));
    }

    #[test]
    fn empty_output_label_only() {
        let outcome = RunOutcome {
            success: true,
            exit_code: Some(0),
            output: String::new(),
            dropped_lines: 0,
        };
        assert_eq!(outcome.labeled("done:", "failed:"), "done:");
        assert_eq!(outcome.prefixed("failed:"), "failed:");
    }
}
