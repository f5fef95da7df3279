//! Pipe transport: newline-delimited JSON on stdin/stdout.
//!
//! Two request forms are accepted on the same stream:
//!
//! ```text
//! {"tool": "list_workflows", "arguments": {"status": "active"}}          -> ResultEnvelope
//! {"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {...}}  -> JSON-RPC response
//! ```
//!
//! The JSON-RPC form implements the tool subset of the Model Context
//! Protocol (`initialize`, `ping`, `tools/list`, `tools/call`). Requests are
//! handled in arrival order; a malformed line produces an error response and
//! the loop keeps reading.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::envelope::ResultEnvelope;

/// MCP protocol revision reported when the client does not ask for one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Line-oriented server over any async reader/writer pair.
#[derive(Debug)]
pub struct StdioServer {
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    max_line_bytes: usize,
}

impl StdioServer {
    pub fn new(dispatcher: Dispatcher, cancel: CancellationToken, max_line_bytes: usize) -> Self {
        Self {
            dispatcher,
            cancel,
            max_line_bytes,
        }
    }

    /// Serve the process's stdin/stdout until EOF or cancellation.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve an arbitrary stream pair. Returns on EOF or cancellation.
    ///
    /// Lines longer than `max_line_bytes` are discarded as they are read and
    /// answered with a validation error; so are lines that are not UTF-8.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("pipe transport ready");

        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("pipe transport shutting down");
                    break;
                }
                next = read_line_bounded(&mut reader, self.max_line_bytes) => next?,
            };

            let response = match frame {
                LineFrame::Eof => {
                    tracing::info!("stdin closed");
                    break;
                }
                LineFrame::Oversized => {
                    tracing::warn!(
                        max_line_bytes = self.max_line_bytes,
                        "oversized line discarded"
                    );
                    Some(self.oversized())
                }
                LineFrame::Line(bytes) => match String::from_utf8(bytes) {
                    Ok(line) => self.handle_line(&line).await,
                    Err(_) => {
                        tracing::warn!("line is not valid UTF-8");
                        let message = "request: line is not valid UTF-8";
                        Some(ResultEnvelope::validation(message).to_value())
                    }
                },
            };

            if let Some(response) = response {
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                writer.write_all(&out).await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Process one input line. `None` means nothing is written back (blank
    /// lines and JSON-RPC notifications).
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line.len() > self.max_line_bytes {
            return Some(self.oversized());
        }

        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) if line.contains("\"jsonrpc\"") => {
                return Some(rpc_error(Value::Null, PARSE_ERROR, &format!("Parse error: {e}")))
            }
            Err(e) => {
                let envelope = ResultEnvelope::validation(format!("request: invalid JSON: {e}"));
                return Some(envelope.to_value());
            }
        };

        if request.get("jsonrpc").is_some() {
            return self.handle_rpc(request).await;
        }

        Some(self.handle_plain(request).await.to_value())
    }

    async fn handle_plain(&self, request: Value) -> ResultEnvelope {
        let Value::Object(mut request) = request else {
            return ResultEnvelope::validation("request: expected object");
        };

        let tool = match request.remove("tool") {
            Some(Value::String(tool)) => tool,
            Some(_) => return ResultEnvelope::validation("tool: expected string"),
            None => return ResultEnvelope::validation("tool: missing required field"),
        };
        let arguments = request.remove("arguments").unwrap_or(Value::Null);

        self.dispatcher.call(&tool, arguments).await
    }

    async fn handle_rpc(&self, request: Value) -> Option<Value> {
        let id = request.get("id").cloned();
        let Some(method) = request.get("method").and_then(Value::as_str) else {
            return id.map(|id| rpc_error(id, INVALID_REQUEST, "Invalid request: missing method"));
        };
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        // Notifications never get a reply.
        let Some(id) = id else {
            tracing::debug!(method, "notification received");
            return None;
        };

        let response = match method {
            "initialize" => rpc_result(id, self.initialize(&params)),
            "ping" => rpc_result(id, json!({})),
            "tools/list" => {
                rpc_result(id, json!({ "tools": self.dispatcher.registry().describe() }))
            }
            "tools/call" => match params.get("name").and_then(Value::as_str) {
                Some(name) => {
                    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                    let envelope = self.dispatcher.call(name, arguments).await;
                    rpc_result(id, call_result(&envelope))
                }
                None => rpc_error(id, INVALID_PARAMS, "Invalid params: missing tool name"),
            },
            other => {
                tracing::debug!(method = other, "unknown method");
                rpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {other}"))
            }
        };

        Some(response)
    }

    fn oversized(&self) -> Value {
        ResultEnvelope::validation(format!("request: exceeds {} bytes", self.max_line_bytes))
            .to_value()
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        json!({
            "protocolVersion": version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }
}

/// One newline-terminated frame read from the pipe.
#[derive(Debug, PartialEq, Eq)]
enum LineFrame {
    Line(Vec<u8>),
    Oversized,
    Eof,
}

/// Read up to the next `\n` (or EOF), buffering at most `max_bytes`.
///
/// Once a line outgrows the limit its remaining bytes are consumed and
/// dropped, so memory stays bounded however long the line is.
async fn read_line_bounded<R>(reader: &mut R, max_bytes: usize) -> std::io::Result<LineFrame>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut oversized = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if oversized {
                LineFrame::Oversized
            } else if line.is_empty() {
                LineFrame::Eof
            } else {
                LineFrame::Line(line)
            });
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let chunk = match newline {
            Some(end) => &available[..end],
            None => available,
        };
        if !oversized {
            if line.len() + chunk.len() > max_bytes {
                oversized = true;
                line = Vec::new();
            } else {
                line.extend_from_slice(chunk);
            }
        }
        let used = newline.map_or(available.len(), |end| end + 1);
        reader.consume(used);

        if newline.is_some() {
            return Ok(if oversized {
                LineFrame::Oversized
            } else {
                LineFrame::Line(line)
            });
        }
    }
}

/// MCP `tools/call` result: pretty JSON of the data, or the error text.
pub fn call_result(envelope: &ResultEnvelope) -> Value {
    let text = match envelope.error() {
        Some(error) => error.to_string(),
        None => {
            let data = envelope.data().unwrap_or(&Value::Null);
            serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
        }
    };

    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": !envelope.is_success(),
    })
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}
