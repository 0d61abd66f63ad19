//! Structured errors
//!
//! Every failure the core reports carries a machine-readable code, a
//! human-readable message and optional hints. Codes are grouped into a small
//! set of kinds so callers can tell a lookup miss from a bad registration.

use crate::PropError;
use serde::{Deserialize, Serialize};

/// Standard error codes (machine-readable)
pub mod codes {
    // Configuration (registration / load time)
    pub const DUPLICATE_IDNAME: &str = "DUPLICATE_IDNAME";
    pub const INVALID_IDNAME: &str = "INVALID_IDNAME";
    pub const RESERVED_NAME: &str = "RESERVED_NAME";
    pub const READ_ONLY_ATTRIBUTE: &str = "READ_ONLY_ATTRIBUTE";
    pub const MISSING_ENTRYPOINT: &str = "MISSING_ENTRYPOINT";
    pub const INVALID_MANIFEST: &str = "INVALID_MANIFEST";
    pub const ADDON_ALREADY_LOADED: &str = "ADDON_ALREADY_LOADED";
    pub const ADDON_PANIC: &str = "ADDON_PANIC";
    // Lookup (access time)
    pub const GROUP_NOT_FOUND: &str = "GROUP_NOT_FOUND";
    pub const PROPERTY_NOT_FOUND: &str = "PROPERTY_NOT_FOUND";
    pub const DATA_GROUP_NOT_FOUND: &str = "DATA_GROUP_NOT_FOUND";
    pub const DATA_NOT_FOUND: &str = "DATA_NOT_FOUND";
    pub const OP_GROUP_NOT_FOUND: &str = "OP_GROUP_NOT_FOUND";
    pub const OPERATOR_NOT_FOUND: &str = "OPERATOR_NOT_FOUND";
    // Values
    pub const TYPE_MISMATCH: &str = "TYPE_MISMATCH";
    pub const INVALID_VALUE: &str = "INVALID_VALUE";
    pub const INVALID_PATH: &str = "INVALID_PATH";
    // Environment
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Broad classification of an error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad registration, bad addon, bad manifest
    Configuration,
    /// Lookup by name found nothing
    NotFound,
    /// Value of the wrong type for its slot
    TypeMismatch,
    /// Value of the right type that fails validation
    InvalidValue,
    Io,
    Internal,
}

/// Structured error reported by every layer of the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Suggestion for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Propagation notes, outermost last
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

impl PvError {
    /// Create a new error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
            notes: Vec::new(),
        }
    }

    /// Builder: add suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Builder: add propagation note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self.code.as_str() {
            codes::DUPLICATE_IDNAME
            | codes::INVALID_IDNAME
            | codes::RESERVED_NAME
            | codes::READ_ONLY_ATTRIBUTE
            | codes::MISSING_ENTRYPOINT
            | codes::INVALID_MANIFEST
            | codes::ADDON_ALREADY_LOADED
            | codes::ADDON_PANIC => ErrorKind::Configuration,
            codes::GROUP_NOT_FOUND
            | codes::PROPERTY_NOT_FOUND
            | codes::DATA_GROUP_NOT_FOUND
            | codes::DATA_NOT_FOUND
            | codes::OP_GROUP_NOT_FOUND
            | codes::OPERATOR_NOT_FOUND => ErrorKind::NotFound,
            codes::TYPE_MISMATCH => ErrorKind::TypeMismatch,
            codes::INVALID_VALUE | codes::INVALID_PATH => ErrorKind::InvalidValue,
            codes::IO_ERROR => ErrorKind::Io,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    // ========== Registration ==========

    pub fn duplicate_idname(what: &str, idname: &str) -> Self {
        Self::new(codes::DUPLICATE_IDNAME, format!("{} '{}' is already registered", what, idname))
            .with_suggestion("Pick a unique idname for each registered class")
    }

    pub fn invalid_idname(what: &str, idname: &str) -> Self {
        Self::new(codes::INVALID_IDNAME, format!("Invalid {} idname: '{}'", what, idname))
            .with_suggestion("Idnames must be non-empty and must not contain '.' or whitespace")
    }

    pub fn reserved_name(name: &str) -> Self {
        Self::new(codes::RESERVED_NAME, format!("'{}' is a reserved name and cannot hold data", name))
            .with_suggestion("Rename the data slot")
    }

    pub fn read_only(group: &str, name: &str) -> Self {
        Self::new(codes::READ_ONLY_ATTRIBUTE,
            format!("'{}.{}' is a plain attribute and cannot be assigned", group, name))
    }

    pub fn missing_entrypoint(addon: &str) -> Self {
        Self::new(codes::MISSING_ENTRYPOINT, format!("Addon '{}' has no registration entrypoint", addon))
            .with_suggestion("Add the addon's register function to the addon catalog")
    }

    pub fn invalid_manifest(addon: &str, details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_MANIFEST,
            format!("Invalid manifest for addon '{}': {}", addon, details.into()))
    }

    pub fn addon_already_loaded(addon: &str) -> Self {
        Self::new(codes::ADDON_ALREADY_LOADED, format!("Addon '{}' was already loaded", addon))
    }

    pub fn addon_panic(addon: &str, details: impl Into<String>) -> Self {
        Self::new(codes::ADDON_PANIC,
            format!("Addon '{}' panicked during registration: {}", addon, details.into()))
    }

    // ========== Lookup ==========

    pub fn group_not_found(idname: &str) -> Self {
        Self::new(codes::GROUP_NOT_FOUND, format!("No property group named '{}'", idname))
    }

    pub fn property_not_found(group: &str, name: &str) -> Self {
        Self::new(codes::PROPERTY_NOT_FOUND,
            format!("Property group '{}' has no property '{}'", group, name))
    }

    pub fn data_group_not_found(idname: &str) -> Self {
        Self::new(codes::DATA_GROUP_NOT_FOUND, format!("No data group named '{}'", idname))
    }

    pub fn data_not_found(group: &str, name: &str) -> Self {
        Self::new(codes::DATA_NOT_FOUND,
            format!("Data group '{}' has no value '{}'", group, name))
            .with_suggestion("Write the value before reading it")
    }

    pub fn op_group_not_found(idname: &str) -> Self {
        Self::new(codes::OP_GROUP_NOT_FOUND, format!("No operator group named '{}'", idname))
    }

    pub fn operator_not_found(group: &str, idname: &str) -> Self {
        Self::new(codes::OPERATOR_NOT_FOUND,
            format!("Operator group '{}' has no operator '{}'", group, idname))
    }

    // ========== Values ==========

    pub fn type_mismatch(expected: &str, got: &str) -> Self {
        Self::new(codes::TYPE_MISMATCH, format!("Expected {}, got {}", expected, got))
    }

    pub fn invalid_value(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_VALUE, format!("Invalid value: {}", details.into()))
    }

    pub fn invalid_path(path: &str) -> Self {
        Self::new(codes::INVALID_PATH, format!("Invalid path: '{}'", path))
            .with_suggestion("Use 'group.name'")
    }

    // ========== Environment ==========

    pub fn io(details: impl Into<String>) -> Self {
        Self::new(codes::IO_ERROR, format!("I/O error: {}", details.into()))
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, format!("Internal error: {}", details.into()))
            .with_suggestion("This is a bug, please report it")
    }
}

impl std::fmt::Display for PvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        for note in &self.notes {
            write!(f, " ({})", note)?;
        }
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for PvError {}

impl From<PropError> for PvError {
    fn from(err: PropError) -> Self {
        match err {
            PropError::TypeMismatch { expected, got } => Self::type_mismatch(expected, got),
            other => Self::invalid_value(other.to_string()),
        }
    }
}

impl From<std::io::Error> for PvError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}
