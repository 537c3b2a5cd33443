//! Tools we expose to MCP clients.

use std::sync::Arc;

use serde_json::{Map, json};

use crate::{
    data_url::decode_base64_payload,
    ocr::{OcrOrchestrator, file_type::FileType},
    prelude::*,
};

/// A tool's public description, as returned by `tools/list`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: &'static str,
    /// What the tool does, for the model's benefit.
    pub description: &'static str,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// A tool that can be called by an MCP client.
///
/// Errors returned by [`Tool::call`] are reported to the client as tool
/// results with `isError` set, not as protocol errors.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Describe this tool.
    fn descriptor(&self) -> ToolDescriptor;

    /// Run this tool, returning text for the client.
    async fn call(&self, args: &Map<String, Value>) -> Result<String>;
}

/// Our tools, in the order they were registered.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.descriptor().name;
        if self.get(name).is_some() {
            return Err(anyhow!("tool {name:?} registered twice"));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Describe every tool.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor()).collect()
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool| tool.descriptor().name == name)
    }
}

/// Build a registry containing our OCR tools.
pub fn ocr_tools(ocr: Arc<OcrOrchestrator>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::default();
    registry.register(Arc::new(OcrFileTool { ocr: ocr.clone() }))?;
    registry.register(Arc::new(OcrBase64Tool { ocr }))?;
    Ok(registry)
}

/// Get a required, non-empty string argument.
fn required_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    match args.get(name).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(anyhow!("missing required argument: {name}")),
    }
}

/// OCR a PDF or image on the server's filesystem.
pub struct OcrFileTool {
    ocr: Arc<OcrOrchestrator>,
}

#[async_trait]
impl Tool for OcrFileTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "ocr_file",
            description: "Extract text from a scanned PDF or image file using Azure Computer Vision OCR. Use this for documents that appear to be scanned or image-based and cannot be read directly.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Absolute path to the PDF or image file to OCR"
                    }
                },
                "required": ["file_path"]
            }),
        }
    }

    #[instrument(level = "debug", name = "ocr_file", skip_all)]
    async fn call(&self, args: &Map<String, Value>) -> Result<String> {
        let file_path = required_str(args, "file_path")?;
        let path = Path::new(file_path);
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(anyhow!("file not found: {file_path}"));
        }
        let file_type = FileType::for_path(path, &[])?;
        info!(file_path, ?file_type, "OCRing file");
        let text = self.ocr.ocr_file(path, file_type).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_owned());
        Ok(format!("OCR extracted text from {name}:\n\n{text}"))
    }
}

/// OCR a base64-encoded PDF or image.
pub struct OcrBase64Tool {
    ocr: Arc<OcrOrchestrator>,
}

#[async_trait]
impl Tool for OcrBase64Tool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "ocr_base64",
            description: "Extract text from base64-encoded PDF or image data using Azure Computer Vision OCR.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "data": {
                        "type": "string",
                        "description": "Base64-encoded file content"
                    },
                    "file_type": {
                        "type": "string",
                        "enum": ["pdf", "image"],
                        "description": "Type of file: 'pdf' or 'image'"
                    }
                },
                "required": ["data", "file_type"]
            }),
        }
    }

    #[instrument(level = "debug", name = "ocr_base64", skip_all)]
    async fn call(&self, args: &Map<String, Value>) -> Result<String> {
        let data = required_str(args, "data")?;
        let file_type = required_str(args, "file_type")?.parse::<FileType>()?;
        let data = decode_base64_payload(data)?;
        info!(bytes = data.len(), ?file_type, "OCRing base64 data");
        let text = self.ocr.ocr_buffer(data, file_type).await?;
        Ok(format!("OCR extracted text:\n\n{text}"))
    }
}
