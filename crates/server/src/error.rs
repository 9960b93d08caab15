//! Errors raised by the tool layer itself.
//!
//! Worker and cache failures arrive as `shellcache_core::Error` and convert
//! to MCP errors on their own; these cover bad tool arguments and output
//! encoding.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool arguments that cannot be acted on.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be serialized.
    #[error("ENCODE_FAILED: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::Encode(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_code() {
        let err: McpError = ToolError::InvalidInput("name or all".into()).into();
        assert_eq!(err.code, ErrorCode(-32602));
        assert!(err.message.starts_with("INVALID_INPUT"));
    }
}
