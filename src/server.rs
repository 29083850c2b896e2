//! Session Server (spec section 4.7): a synchronous stdin/stdout
//! line-delimited request/response loop.
//!
//! Grounded on `bin/mcp_server_stdio.rs.ref`'s `for line in reader.lines()`
//! loop and stderr-only logging, generalized from JSON-RPC methods to the
//! op protocol of spec section 6. No async runtime: spec section 9
//! mandates the simplest possible concurrency model for this component.

use crate::errors::{ErrorFrame, ParserError};
use crate::query::QueryEngine;
use crate::validation::{validate_entry_key, validate_section_name};
use serde_json::{json, Value as Json};
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Exit codes per spec section 4.7's lifecycle: 0 normal shutdown, 1
/// archive error, 2 parse error, 3 invalid startup arguments.
pub const EXIT_OK: i32 = 0;
pub const EXIT_ARCHIVE_ERROR: i32 = 1;
pub const EXIT_PARSE_ERROR: i32 = 2;
pub const EXIT_INVALID_ARGS: i32 = 3;

pub struct SessionServer {
    engine: QueryEngine,
    closed: bool,
}

impl SessionServer {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            engine,
            closed: false,
        }
    }

    /// Runs the read-dispatch-write loop until EOF or `close`. Tolerates
    /// LF or CRLF line endings on input; always emits LF-only on output
    /// (spec section 6.1).
    pub fn run<R: BufRead, W: Write>(&mut self, reader: R, mut writer: W) -> std::io::Result<i32> {
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let request: Json = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    write_frame(&mut writer, &json!({ "ok": false, "message": format!("invalid JSON: {e}") }))?;
                    continue;
                }
            };

            if self.closed {
                write_frame(
                    &mut writer,
                    &json!({ "ok": false, "message": ParserError::SessionClosed.to_string() }),
                )?;
                continue;
            }

            match self.dispatch(&request, &mut writer)? {
                DispatchOutcome::Continue => {}
                DispatchOutcome::Close => {
                    self.closed = true;
                    write_frame(&mut writer, &json!({ "ok": true }))?;
                    return Ok(EXIT_OK);
                }
            }
        }
        Ok(EXIT_OK)
    }

    fn dispatch<W: Write>(&mut self, request: &Json, writer: &mut W) -> std::io::Result<DispatchOutcome> {
        let op = request.get("op").and_then(|v| v.as_str()).unwrap_or("");
        info!(op, "dispatching request");

        match op {
            "extract_sections" => {
                let sections = string_array(request, "sections");
                let result = self.engine.extract_sections(&sections);
                write_frame(writer, &ok_with(result))?;
            }
            "iter_section" => {
                self.handle_iter_section(request, writer)?;
            }
            "get_entry" => {
                let (section, key) = section_and_key(request);
                if let Err(e) = validate_section_name(&section).and_then(|_| validate_entry_key(&key)) {
                    write_frame(writer, &query_error(&e.to_string()))?;
                } else {
                    let result = self.engine.get_entry(&section, &key);
                    write_frame(writer, &ok_with(result))?;
                }
            }
            "get_entries" => {
                let section = request.get("section").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let keys = string_array(request, "keys");
                let fields = request.get("fields").map(|_| string_array(request, "fields"));
                let result = self.engine.get_entries(&section, &keys, fields.as_deref());
                write_frame(writer, &ok_with(result))?;
            }
            "count_keys" => {
                let keys = string_array(request, "keys");
                let result = self.engine.count_keys(&keys);
                write_frame(writer, &ok_with(result))?;
            }
            "contains_tokens" => {
                let tokens = string_array(request, "tokens");
                let result = self.engine.contains_tokens(&tokens);
                write_frame(writer, &ok_with(result))?;
            }
            "contains_kv" => {
                let pairs = pair_array(request, "pairs");
                let result = self.engine.contains_kv(&pairs);
                write_frame(writer, &ok_with(result))?;
            }
            "get_country_summaries" => {
                let fields = string_array(request, "fields");
                let result = self.engine.get_country_summaries(&fields);
                write_frame(writer, &ok_with(result))?;
            }
            "get_duplicate_values" => {
                let section = request.get("section").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let key = request.get("key").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let field = request.get("field").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let result = self.engine.get_duplicate_values(&section, &key, &field);
                write_frame(writer, &ok_with(result))?;
            }
            "get_entry_text" => {
                let (section, key) = section_and_key(request);
                let result = self.engine.get_entry_text(&section, &key);
                write_frame(writer, &ok_with(result))?;
            }
            "multi" => {
                self.handle_multi(request, writer)?;
            }
            "close" => {
                return Ok(DispatchOutcome::Close);
            }
            other => {
                warn!(op = other, "unknown op");
                write_frame(writer, &query_error(&format!("unknown op '{other}'")))?;
            }
        }
        Ok(DispatchOutcome::Continue)
    }

    fn handle_iter_section<W: Write>(&self, request: &Json, writer: &mut W) -> std::io::Result<()> {
        let section = request.get("section").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let batch_size = request.get("batch_size").and_then(|v| v.as_u64()).unwrap_or(1).max(1) as usize;

        write_frame(writer, &json!({ "ok": true, "stream": true, "section": section }))?;

        let entries: Vec<(&str, &crate::value::Value)> = self.engine.iter_section(&section).collect();
        for chunk in entries.chunks(batch_size) {
            let frame = if batch_size > 1 {
                let entries: Vec<Json> = chunk
                    .iter()
                    .map(|(k, v)| json!({ "key": k, "value": v }))
                    .collect();
                json!({ "entries": entries })
            } else {
                let (k, v) = chunk[0];
                json!({ "entry": { "key": k, "value": v } })
            };
            write_frame(writer, &ok_with(frame))?;
        }

        write_frame(writer, &json!({ "ok": true, "done": true }))
    }

    fn handle_multi<W: Write>(&mut self, request: &Json, writer: &mut W) -> std::io::Result<()> {
        let Some(ops) = request.get("ops").and_then(|v| v.as_array()) else {
            write_frame(writer, &query_error("multi requires an 'ops' array"))?;
            return Ok(());
        };

        let mut results = Vec::with_capacity(ops.len());
        for op_request in ops {
            let op_name = op_request.get("op").and_then(|v| v.as_str()).unwrap_or("");
            if op_name == "iter_section" || op_name == "close" {
                results.push(json!({
                    "ok": false,
                    "message": format!("'{op_name}' is not permitted inside multi"),
                }));
                continue;
            }
            let mut sink = Vec::new();
            match self.dispatch(op_request, &mut sink) {
                Ok(_) => {
                    let text = String::from_utf8_lossy(&sink);
                    let value: Json = serde_json::from_str(text.trim_end()).unwrap_or(Json::Null);
                    results.push(value);
                }
                Err(e) => {
                    results.push(json!({ "ok": false, "message": e.to_string() }));
                }
            }
        }

        write_frame(writer, &json!({ "ok": true, "results": results }))
    }
}

enum DispatchOutcome {
    Continue,
    Close,
}

fn ok_with(mut value: Json) -> Json {
    if let Json::Object(ref mut map) = value {
        map.insert("ok".to_string(), Json::Bool(true));
        value
    } else {
        json!({ "ok": true, "value": value })
    }
}

fn query_error(message: &str) -> Json {
    let frame = ErrorFrame::from(&ParserError::query(message));
    serde_json::to_value(frame).unwrap_or(Json::Null)
}

fn string_array(request: &Json, field: &str) -> Vec<String> {
    request
        .get(field)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
        .unwrap_or_default()
}

fn pair_array(request: &Json, field: &str) -> Vec<(String, String)> {
    request
        .get(field)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|pair| {
                    let pair = pair.as_array()?;
                    let key = pair.first()?.as_str()?.to_string();
                    let value = pair.get(1)?.as_str()?.to_string();
                    Some((key, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn section_and_key(request: &Json) -> (String, String) {
    let section = request.get("section").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let key = request.get("key").and_then(|v| v.as_str()).unwrap_or("").to_string();
    (section, key)
}

fn write_frame<W: Write>(writer: &mut W, value: &Json) -> std::io::Result<()> {
    let text = serde_json::to_string(value)?;
    writer.write_all(text.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;
    use std::io::Cursor;

    fn server(gamestate: &str) -> SessionServer {
        let root = parse_document(gamestate).unwrap();
        SessionServer::new(QueryEngine::new(root, String::new(), gamestate.to_string()))
    }

    fn run(server: &mut SessionServer, input: &str) -> Vec<Json> {
        let reader = Cursor::new(input.as_bytes());
        let mut output = Vec::new();
        server.run(reader, &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn get_entry_roundtrip() {
        let mut srv = server(r#"country={ 1={ name="Alpha" } }"#);
        let responses = run(&mut srv, "{\"op\":\"get_entry\",\"section\":\"country\",\"key\":\"1\"}\nclose\n");
        assert_eq!(responses[0]["found"], json!(true));
    }

    #[test]
    fn unknown_op_is_query_error_not_crash() {
        let mut srv = server("country={ }");
        let responses = run(&mut srv, "{\"op\":\"frobnicate\"}\n");
        assert_eq!(responses[0]["ok"], json!(false));
    }

    #[test]
    fn close_terminates_session_with_exit_zero() {
        let mut srv = server("country={ }");
        let reader = Cursor::new(b"{\"op\":\"close\"}\n".as_ref());
        let mut output = Vec::new();
        let code = srv.run(reader, &mut output).unwrap();
        assert_eq!(code, EXIT_OK);
    }

    #[test]
    fn ops_after_close_return_session_closed_error() {
        let mut srv = server("country={ }");
        let responses = run(
            &mut srv,
            "{\"op\":\"close\"}\n{\"op\":\"get_entry\",\"section\":\"country\",\"key\":\"1\"}\n",
        );
        // Only the close response is produced; lines after close in the same
        // run() call never reach dispatch since run() returns immediately.
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["ok"], json!(true));
    }

    #[test]
    fn iter_section_emits_header_frames_and_terminator() {
        let mut srv = server("fleet={ 1={ } 2={ } }");
        let responses = run(&mut srv, "{\"op\":\"iter_section\",\"section\":\"fleet\",\"batch_size\":1}\n");
        assert_eq!(responses[0]["stream"], json!(true));
        assert!(responses[1].get("entry").is_some());
        assert!(responses[2].get("entry").is_some());
        assert_eq!(responses[3]["done"], json!(true));
    }

    #[test]
    fn multi_forbids_iter_section_and_close() {
        let mut srv = server("country={ }");
        let responses = run(
            &mut srv,
            "{\"op\":\"multi\",\"ops\":[{\"op\":\"close\"},{\"op\":\"iter_section\",\"section\":\"country\"}]}\n",
        );
        let results = responses[0]["results"].as_array().unwrap();
        assert_eq!(results[0]["ok"], json!(false));
        assert_eq!(results[1]["ok"], json!(false));
    }

    #[test]
    fn multi_results_match_sequential_calls() {
        let mut srv = server(r#"country={ 1={ name="Alpha" } }"#);
        let multi_responses = run(
            &mut srv,
            "{\"op\":\"multi\",\"ops\":[{\"op\":\"get_entry\",\"section\":\"country\",\"key\":\"1\"},{\"op\":\"count_keys\",\"keys\":[\"name\"]}]}\n",
        );
        let mut srv2 = server(r#"country={ 1={ name="Alpha" } }"#);
        let sequential = run(
            &mut srv2,
            "{\"op\":\"get_entry\",\"section\":\"country\",\"key\":\"1\"}\n{\"op\":\"count_keys\",\"keys\":[\"name\"]}\n",
        );
        let multi_results = multi_responses[0]["results"].as_array().unwrap();
        assert_eq!(multi_results[0]["found"], sequential[0]["found"]);
        assert_eq!(multi_results[1]["counts"], sequential[1]["counts"]);
    }

    #[test]
    fn crlf_input_is_tolerated() {
        let mut srv = server(r#"country={ 1={ } }"#);
        let responses = run(&mut srv, "{\"op\":\"get_entry\",\"section\":\"country\",\"key\":\"1\"}\r\n");
        assert_eq!(responses[0]["found"], json!(true));
    }
}
