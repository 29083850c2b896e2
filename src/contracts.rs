//! Domain contracts: the traits the session server dispatches through.
//!
//! Synchronous throughout — spec section 9 mandates the simplest possible
//! concurrency model (no async runtime anywhere in this crate), so these
//! traits are plain `fn`, not `async fn`, unlike the teacher's `Storage`/
//! `Index` traits which this module's shape is otherwise grounded on.

use crate::errors::ParserError;
use crate::value::Value;

/// Loads a save archive into the two raw text members the tree builder
/// consumes. The only trait in this crate permitted to touch the
/// filesystem (spec section 4.1).
///
/// # Preconditions
/// - `path` names a file that exists and is readable.
///
/// # Postconditions
/// - On success, both returned strings are valid UTF-8 (malformed bytes
///   are replaced, never rejected — spec section 4.1's lossy-decode rule).
///
/// # Invariants
/// - Never partially loads: either both members are returned or an
///   `ParserError::Archive` is returned and no partial state is visible.
pub trait ArchiveLoader {
    fn load(&self, path: &std::path::Path) -> Result<LoadedSave, ParserError>;
}

pub struct LoadedSave {
    pub meta: String,
    pub gamestate: String,
}

/// The parsed, indexed document a session holds for its lifetime.
///
/// # Preconditions
/// - `section` and `key` arguments are non-empty (enforced by
///   `ValidatedSectionName`/`ValidatedEntryKey` before reaching this trait).
///
/// # Postconditions
/// - Every read method is side-effect free; the underlying tree and index
///   are never mutated after construction (spec section 3).
///
/// # Invariants
/// - The same `(section, key)` pair always returns the same value for the
///   lifetime of one session (immutability of the parsed tree).
pub trait QueryEngine {
    fn get_entry(&self, section: &str, key: &str) -> Option<&Value>;
    fn iter_section(&self, section: &str) -> Box<dyn Iterator<Item = (&str, &Value)> + '_>;
    fn has_section(&self, section: &str) -> bool;
}

/// The framing contract between the session server and whatever carries
/// its bytes (stdio in production, an in-memory buffer in tests).
///
/// # Preconditions
/// - `write_line` is called with a string containing no embedded `\n`.
///
/// # Postconditions
/// - `write_line` always terminates its output with a single `\n`,
///   regardless of what line ending the corresponding request used (spec
///   section 6.1: "MUST emit LF-only on output").
///
/// # Invariants
/// - Lines are written in the order `write_line` was called; no reordering
///   or batching across calls.
pub trait SessionTransport {
    fn read_line(&mut self) -> std::io::Result<Option<String>>;
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BufferTransport {
        input: std::collections::VecDeque<String>,
        output: Vec<String>,
    }

    impl SessionTransport for BufferTransport {
        fn read_line(&mut self) -> std::io::Result<Option<String>> {
            Ok(self.input.pop_front())
        }

        fn write_line(&mut self, line: &str) -> std::io::Result<()> {
            assert!(!line.contains('\n'), "write_line must not receive embedded newlines");
            self.output.push(format!("{line}\n"));
            Ok(())
        }
    }

    #[test]
    fn transport_always_terminates_with_lf() {
        let mut transport = BufferTransport {
            input: std::collections::VecDeque::new(),
            output: Vec::new(),
        };
        transport.write_line("{\"ok\":true}").unwrap();
        assert!(transport.output[0].ends_with('\n'));
        assert!(!transport.output[0].ends_with("\r\n"));
    }
}
