//! Client Bridge (spec section 4.8): spawns the parser binary as a child
//! process and talks to it over the line-delimited protocol.
//!
//! Grounded directly on `rust_bridge.py`'s `RustSession` class — this is
//! the Python caller of the binary this crate produces, so the bridge
//! mirrors its framing/threading contract exactly: a background stdout
//! reader thread feeding a bounded channel, a stderr-drain thread keeping
//! a ring buffer, and a blocking receive with a configurable timeout.

use crate::errors::ParserError;
use serde_json::Value as Json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const STDERR_RING_CAPACITY: usize = 200;

enum ReaderMessage {
    Line(String),
    Eof,
    Error(String),
}

pub struct BridgeSession {
    child: Child,
    stdin: std::process::ChildStdin,
    receiver: Receiver<ReaderMessage>,
    stderr_lines: Arc<Mutex<VecDeque<String>>>,
    timeout: Duration,
    closed: bool,
    in_stream: bool,
}

impl BridgeSession {
    /// Spawns `<binary> serve --path <save_path>` and wires up the reader
    /// and stderr-drain threads.
    pub fn start(save_path: &Path, timeout: Duration) -> Result<Self, ParserError> {
        let binary = discover_binary()?;
        if !save_path.exists() {
            return Err(ParserError::Bridge {
                message: format!("save file not found: {}", save_path.display()),
            });
        }

        let mut child = Command::new(&binary)
            .arg("serve")
            .arg("--path")
            .arg(save_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ParserError::Bridge {
                message: format!("failed to spawn '{}': {e}", binary.display()),
            })?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let (tx, rx): (Sender<ReaderMessage>, Receiver<ReaderMessage>) = mpsc::channel();
        std::thread::Builder::new()
            .name("bridge-reader".into())
            .spawn(move || reader_loop(stdout, tx))
            .expect("spawning reader thread");

        let stderr_lines = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_RING_CAPACITY)));
        let stderr_lines_writer = Arc::clone(&stderr_lines);
        std::thread::Builder::new()
            .name("bridge-stderr".into())
            .spawn(move || stderr_loop(stderr, stderr_lines_writer))
            .expect("spawning stderr thread");

        Ok(Self {
            child,
            stdin,
            receiver: rx,
            stderr_lines,
            timeout,
            closed: false,
            in_stream: false,
        })
    }

    fn stderr_tail(&self) -> String {
        self.stderr_lines
            .lock()
            .expect("stderr ring buffer lock")
            .iter()
            .rev()
            .take(20)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drains leftover `iter_section` frames from a previous call that the
    /// caller abandoned before reading the terminator (spec section 4.8:
    /// "drain-on-break, the session remains usable").
    fn drain_stream(&mut self) {
        if !self.in_stream {
            return;
        }
        loop {
            match self.receiver.recv_timeout(self.timeout) {
                Ok(ReaderMessage::Line(line)) => {
                    if let Ok(value) = serde_json::from_str::<Json>(&line) {
                        if value.get("done").and_then(|v| v.as_bool()) == Some(true) {
                            break;
                        }
                    }
                }
                Ok(ReaderMessage::Eof) | Ok(ReaderMessage::Error(_)) | Err(_) => break,
            }
        }
        self.in_stream = false;
    }

    fn send(&mut self, request: &Json) -> Result<(), ParserError> {
        if self.closed || self.child.try_wait().ok().flatten().is_some() {
            return Err(ParserError::SessionClosed);
        }
        self.drain_stream();

        let mut line = serde_json::to_string(request).expect("request serializes");
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).map_err(|_| ParserError::Bridge {
            message: "session crashed unexpectedly (broken pipe)".to_string(),
        })?;
        self.stdin.flush().map_err(|_| ParserError::Bridge {
            message: "session crashed unexpectedly (broken pipe)".to_string(),
        })
    }

    fn recv(&mut self) -> Result<Json, ParserError> {
        let start = std::time::Instant::now();
        match self.receiver.recv_timeout(self.timeout) {
            Ok(ReaderMessage::Line(line)) => {
                let response: Json = serde_json::from_str(&line).map_err(|e| ParserError::Bridge {
                    message: format!("malformed response line: {e}"),
                })?;
                if response.get("ok").and_then(|v| v.as_bool()) != Some(true) {
                    let message = response
                        .get("message")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    return Err(ParserError::Query { message });
                }
                Ok(response)
            }
            Ok(ReaderMessage::Eof) => Err(ParserError::Bridge {
                message: format!("session ended unexpectedly (EOF)\n{}", self.stderr_tail()),
            }),
            Ok(ReaderMessage::Error(e)) => Err(ParserError::Bridge {
                message: format!("reader thread error: {e}"),
            }),
            Err(RecvTimeoutError::Timeout) => Err(ParserError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ParserError::Bridge {
                message: "reader thread disconnected".to_string(),
            }),
        }
    }

    pub fn extract_sections(&mut self, sections: &[String]) -> Result<Json, ParserError> {
        self.send(&serde_json::json!({ "op": "extract_sections", "sections": sections }))?;
        self.recv()
    }

    /// Opens an `iter_section` stream: sends the request, reads the header
    /// frame, and returns the raw data-frame stream for the caller to pull
    /// from via `next_stream_frame`. Marks the session as mid-stream so a
    /// subsequent `send` drains automatically if abandoned.
    pub fn iter_section_start(&mut self, section: &str, batch_size: usize) -> Result<Json, ParserError> {
        self.send(&serde_json::json!({ "op": "iter_section", "section": section, "batch_size": batch_size }))?;
        let header = self.recv()?;
        if header.get("stream").and_then(|v| v.as_bool()) != Some(true) {
            return Err(ParserError::Stream {
                message: "expected stream header from iter_section".to_string(),
            });
        }
        self.in_stream = true;
        Ok(header)
    }

    /// Pulls the next frame of an open stream. Returns `None` once the
    /// terminator (`{done: true}`) has been consumed.
    pub fn next_stream_frame(&mut self) -> Result<Option<Json>, ParserError> {
        if !self.in_stream {
            return Ok(None);
        }
        let frame = self.recv()?;
        if frame.get("done").and_then(|v| v.as_bool()) == Some(true) {
            self.in_stream = false;
            return Ok(None);
        }
        Ok(Some(frame))
    }

    pub fn close(&mut self) -> Result<(), ParserError> {
        if self.closed {
            return Ok(());
        }
        self.send(&serde_json::json!({ "op": "close" }))?;
        let _ = self.recv();
        self.closed = true;
        Ok(())
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn reader_loop(stdout: std::process::ChildStdout, tx: Sender<ReaderMessage>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.send(ReaderMessage::Line(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(ReaderMessage::Error(e.to_string()));
                return;
            }
        }
    }
    let _ = tx.send(ReaderMessage::Eof);
}

fn stderr_loop(stderr: std::process::ChildStderr, ring: Arc<Mutex<VecDeque<String>>>) {
    let reader = BufReader::new(stderr);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let mut ring = ring.lock().expect("stderr ring buffer lock");
        if ring.len() == STDERR_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(line);
    }
}

/// Binary discovery order per spec section 4.8: `PARSER_BINARY` env var,
/// then a path adjacent to the current executable (bundled layout), then
/// the development build path (`target/release/stellaris-parser`), then a
/// package-relative `bin/` directory, then `PATH`.
fn discover_binary() -> Result<PathBuf, ParserError> {
    if let Ok(env_path) = std::env::var("PARSER_BINARY") {
        return Ok(PathBuf::from(env_path));
    }

    let binary_name = if cfg!(windows) {
        "stellaris-parser.exe"
    } else {
        "stellaris-parser"
    };

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let adjacent = dir.join(binary_name);
            if adjacent.exists() {
                return Ok(adjacent);
            }
        }
    }

    let dev_path = PathBuf::from("target/release").join(binary_name);
    if dev_path.exists() {
        return Ok(dev_path);
    }

    let bin_path = PathBuf::from("bin").join(binary_name);
    if bin_path.exists() {
        return Ok(bin_path);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(binary_name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(ParserError::Bridge {
        message: format!("parser binary '{binary_name}' not found in any search location"),
    })
}

thread_local! {
    static ACTIVE_SESSION: RefCell<Vec<PathBuf>> = const { RefCell::new(Vec::new()) };
}

/// Thread-local active-session stack supporting nested context scopes
/// (spec section 4.8): each thread manages its own stack of save paths
/// currently "in scope" for session-mode helpers.
pub fn push_active_session(path: PathBuf) {
    ACTIVE_SESSION.with(|stack| stack.borrow_mut().push(path));
}

pub fn pop_active_session() {
    ACTIVE_SESSION.with(|stack| {
        stack.borrow_mut().pop();
    });
}

pub fn current_active_session() -> Option<PathBuf> {
    ACTIVE_SESSION.with(|stack| stack.borrow().last().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_takes_priority() {
        std::env::set_var("PARSER_BINARY", "/custom/path/to/parser");
        let resolved = discover_binary().unwrap();
        assert_eq!(resolved, PathBuf::from("/custom/path/to/parser"));
        std::env::remove_var("PARSER_BINARY");
    }

    #[test]
    fn active_session_stack_is_thread_local_and_nestable() {
        assert_eq!(current_active_session(), None);
        push_active_session(PathBuf::from("a.sav"));
        push_active_session(PathBuf::from("b.sav"));
        assert_eq!(current_active_session(), Some(PathBuf::from("b.sav")));
        pop_active_session();
        assert_eq!(current_active_session(), Some(PathBuf::from("a.sav")));
        pop_active_session();
        assert_eq!(current_active_session(), None);
    }
}
