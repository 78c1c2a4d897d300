use std::{io, path::PathBuf};

use config::ConfigError as ConfigLoaderError;
use rmcp::model::ErrorData;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to build (read) the configuration file.
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Failed to deserialize TOML into a struct.
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Required field is missing.
    #[error("Configuration file {path} is missing `{field}`")]
    MissingField { path: PathBuf, field: &'static str },
    /// Field failed validation.
    #[error("Configuration file {path} has invalid `{field}`: {message}")]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// Helper to wrap `config::ConfigError` as a read failure.
    pub fn from_read_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::FileRead { path, source }
    }

    /// Helper to wrap `config::ConfigError` as a parse failure.
    pub fn from_parse_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::Parse { path, source }
    }
}

/// Failure raised by any geospatial tool.
#[derive(Debug, Error)]
pub enum GisError {
    #[error("{message}")]
    InvalidInput { message: String },
    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },
    #[error("Unsupported geometry: {message}")]
    UnsupportedGeometry { message: String },
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },
    #[error("Columns not found: {columns:?}")]
    MissingColumns { columns: Vec<String> },
    #[error("CRS error: {message}")]
    Crs { message: String },
    #[error("Raster error: {message}")]
    Raster { message: String },
    #[error("Vector data error: {message}")]
    Vector { message: String },
    #[error("Statistics error: {message}")]
    Statistics { message: String },
    #[error("Map rendering failed: {message}")]
    Render { message: String },
    #[error("Unsupported format `{format}`")]
    UnsupportedFormat { format: String },
    #[error("File already exists: {path}. Set overwrite=true to replace it.")]
    OutputExists { path: PathBuf },
    #[error("I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Tool task failed: {message}")]
    Internal { message: String },
}

impl GisError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    pub fn unsupported_geometry(message: impl Into<String>) -> Self {
        Self::UnsupportedGeometry {
            message: message.into(),
        }
    }

    pub fn crs(message: impl Into<String>) -> Self {
        Self::Crs {
            message: message.into(),
        }
    }

    pub fn raster(message: impl Into<String>) -> Self {
        Self::Raster {
            message: message.into(),
        }
    }

    pub fn vector(message: impl Into<String>) -> Self {
        Self::Vector {
            message: message.into(),
        }
    }

    pub fn statistics(message: impl Into<String>) -> Self {
        Self::Statistics {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Structured error metadata returned by MCP tools.
#[derive(Debug, Clone, Serialize)]
pub struct ToolErrorDescriptor {
    /// Error code.
    pub code: &'static str,
    /// User-facing message.
    pub message: &'static str,
    /// Recommended remediation.
    pub remediation: &'static str,
}

impl ToolErrorDescriptor {
    /// Simple constructor.
    pub const fn new(code: &'static str, message: &'static str, remediation: &'static str) -> Self {
        Self {
            code,
            message,
            remediation,
        }
    }

    /// Create a builder.
    pub fn builder(&self) -> ToolErrorDescriptorBuilder<'_> {
        ToolErrorDescriptorBuilder::new(self)
    }
}

/// Where a tool failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Arguments supplied by the caller.
    Input,
    /// Contents of a dataset on disk.
    Data,
    /// Numerical or geometric computation.
    Computation,
    /// Writing results under the storage root.
    Storage,
}

impl ErrorScope {
    fn as_str(&self) -> &'static str {
        match self {
            ErrorScope::Input => "input",
            ErrorScope::Data => "data",
            ErrorScope::Computation => "computation",
            ErrorScope::Storage => "storage",
        }
    }
}

/// Builder for error data that fails if required fields are missing.
pub struct ToolErrorDescriptorBuilder<'a> {
    descriptor: &'a ToolErrorDescriptor,
    retryable: Option<bool>,
    scope: Option<ErrorScope>,
    details: Option<Value>,
    extra_fields: Map<String, Value>,
}

impl<'a> ToolErrorDescriptorBuilder<'a> {
    pub fn new(descriptor: &'a ToolErrorDescriptor) -> Self {
        Self {
            descriptor,
            retryable: None,
            scope: None,
            details: None,
            extra_fields: Map::new(),
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn scope(mut self, scope: ErrorScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_context_field(mut self, key: &str, value: Value) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Result<ErrorData, ToolErrorBuilderError> {
        if self.descriptor.remediation.trim().is_empty() {
            return Err(ToolErrorBuilderError::MissingRemediation {
                code: self.descriptor.code,
            });
        }
        let retryable = self
            .retryable
            .ok_or(ToolErrorBuilderError::MissingRetryable {
                code: self.descriptor.code,
            })?;
        let scope = self.scope.ok_or(ToolErrorBuilderError::MissingScope {
            code: self.descriptor.code,
        })?;

        let mut data = Map::new();
        data.insert("code".into(), Value::String(self.descriptor.code.into()));
        data.insert(
            "remediation".into(),
            Value::String(self.descriptor.remediation.into()),
        );
        data.insert("retryable".into(), Value::Bool(retryable));
        data.insert("scope".into(), Value::String(scope.as_str().into()));
        if let Some(details) = self.details {
            data.insert("details".into(), details);
        }
        for (key, value) in self.extra_fields {
            data.insert(key, value);
        }

        Ok(ErrorData::invalid_params(
            self.descriptor.message,
            Some(Value::Object(data)),
        ))
    }
}

/// Errors when required builder fields are missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolErrorBuilderError {
    #[error("retryable is missing (code={code})")]
    MissingRetryable { code: &'static str },
    #[error("scope is missing (code={code})")]
    MissingScope { code: &'static str },
    #[error("remediation is empty (code={code})")]
    MissingRemediation { code: &'static str },
}

#[cfg(test)]
mod tests {
    use rmcp::model::ErrorData;
    use serde_json::json;

    use super::*;

    const BASE_DESCRIPTOR: ToolErrorDescriptor = ToolErrorDescriptor::new(
        "sample_error",
        "Sample error",
        "Check the input before retrying.",
    );

    #[test]
    fn builder_produces_error_data_with_required_fields() {
        let error = ToolErrorDescriptorBuilder::new(&BASE_DESCRIPTOR)
            .retryable(true)
            .scope(ErrorScope::Data)
            .details(json!({ "info": "details" }))
            .with_context_field("tool", json!("buffer"))
            .build()
            .expect("builder must succeed");

        assert_eq!(error.message, BASE_DESCRIPTOR.message);
        let data = extract_data(&error);
        assert_eq!(
            data.get("code").and_then(|v| v.as_str()),
            Some("sample_error")
        );
        assert_eq!(
            data.get("remediation").and_then(|v| v.as_str()),
            Some("Check the input before retrying.")
        );
        assert_eq!(data.get("retryable").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(data.get("scope").and_then(|v| v.as_str()), Some("data"));
        assert_eq!(data.get("details"), Some(&json!({ "info": "details" })));
        assert_eq!(data.get("tool"), Some(&json!("buffer")));
    }

    #[test]
    fn builder_fails_when_scope_missing() {
        let result = ToolErrorDescriptorBuilder::new(&BASE_DESCRIPTOR)
            .retryable(false)
            .build();
        assert_eq!(
            result.unwrap_err(),
            ToolErrorBuilderError::MissingScope {
                code: BASE_DESCRIPTOR.code
            }
        );
    }

    #[test]
    fn builder_fails_when_remediation_blank() {
        const BLANK_DESCRIPTOR: ToolErrorDescriptor =
            ToolErrorDescriptor::new("blank", "blank", "");
        let result = ToolErrorDescriptorBuilder::new(&BLANK_DESCRIPTOR)
            .retryable(false)
            .scope(ErrorScope::Input)
            .build();
        assert_eq!(
            result.unwrap_err(),
            ToolErrorBuilderError::MissingRemediation {
                code: BLANK_DESCRIPTOR.code
            }
        );
    }

    #[test]
    fn gis_error_messages_name_the_offending_value() {
        let err = GisError::MissingColumns {
            columns: vec!["POP".into()],
        };
        assert_eq!(err.to_string(), "Columns not found: [\"POP\"]");

        let err = GisError::FileNotFound {
            path: PathBuf::from("/tmp/nope.shp"),
        };
        assert!(err.to_string().contains("/tmp/nope.shp"));
    }

    fn extract_data(error: &ErrorData) -> Map<String, Value> {
        error
            .data
            .as_ref()
            .and_then(|value| value.as_object())
            .cloned()
            .expect("error data should be an object")
    }
}
