//! JSON-RPC 2.0 request routing for our MCP server.

use serde_json::{Map, json};

use super::tools::ToolRegistry;
use crate::prelude::*;

/// The MCP protocol revision we speak.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The name we report in `initialize`.
pub const SERVER_NAME: &str = "azure-ocr";

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// A JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A JSON-RPC response. Exactly one of `result` and `error` is present.
#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Response {
    fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: "2.0",
            id,
            result,
            error,
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to serialize response")
    }
}

/// Is this the client's "initialization finished" notification?
fn is_initialized_notification(method: &str) -> bool {
    matches!(method, "initialized" | "notifications/initialized")
}

/// Decodes JSON-RPC requests, routes them, and encodes responses.
pub struct RpcDispatcher {
    tools: ToolRegistry,
}

impl RpcDispatcher {
    /// Create a dispatcher serving `tools`.
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    /// Handle one incoming message, returning the encoded response, if any.
    ///
    /// Notifications (requests without an `id`, or with a null one) never get
    /// a response.
    pub async fn dispatch(&self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        let message = match serde_json::from_slice::<Value>(frame) {
            Ok(message) => message,
            Err(err) => {
                warn!("Received invalid JSON: {err}");
                let error = RpcError::new(PARSE_ERROR, "Parse error");
                return Response::new(Value::Null, Err(error)).to_bytes().map(Some);
            }
        };

        let id = message.get("id").cloned();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            warn!("Received a message without a method");
            let error = RpcError::new(INVALID_REQUEST, "Invalid Request");
            return Response::new(id.unwrap_or(Value::Null), Err(error))
                .to_bytes()
                .map(Some);
        };

        // `initialized` is acknowledged by silence, even if a client sends an id.
        if is_initialized_notification(method) {
            debug!(method, "Client finished initializing");
            return Ok(None);
        }

        let Some(id) = id.filter(|id| !id.is_null()) else {
            debug!(method, "Received notification");
            return Ok(None);
        };

        let empty_params = Value::Object(Map::new());
        let params = message.get("params").unwrap_or(&empty_params);
        debug!(method, %id, "Received request");
        let outcome = self.handle_request(method, params).await;
        Response::new(id, outcome).to_bytes().map(Some)
    }

    /// Run a single request.
    async fn handle_request(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {
                    "tools": {},
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.descriptors() })),
            "tools/call" => Ok(self.call_tool(params).await),
            _ => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            )),
        }
    }

    /// Call a tool, turning any failure into an `isError` result.
    async fn call_tool(&self, params: &Value) -> Value {
        match self.try_call_tool(params).await {
            Ok(text) => json!({
                "content": [{ "type": "text", "text": text }],
            }),
            Err(err) => {
                warn!("Tool call failed: {err:#}");
                json!({
                    "content": [{ "type": "text", "text": format!("Error: {err:#}") }],
                    "isError": true,
                })
            }
        }
    }

    async fn try_call_tool(&self, params: &Value) -> Result<String> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("missing required argument: name"))?;
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow!("unknown tool: {name}"))?;
        let empty_args = Map::new();
        let args = match params.get("arguments") {
            None | Some(Value::Null) => &empty_args,
            Some(Value::Object(args)) => args,
            Some(_) => return Err(anyhow!("tool arguments must be an object")),
        };
        tool.call(args).await
    }
}
