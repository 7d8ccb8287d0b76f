use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DEFAULT_BUILTINS: &[&str] = &[
    "Int", "UInt", "Float", "Bool", "String", "Byte", "Bit", "bit", "byte", "int", "uint", "vint",
    "vuint", "float", "ufloat", "string", "vstring", "time", "date", "dateTime",
];

const DEFAULT_RESERVED: &[&str] = &[
    "abstract",
    "array",
    "assert",
    "checksum",
    "const",
    "discriminator",
    "implicit",
    "manual",
    "manualArray",
    "padding",
    "peek",
    "reserved",
    "simple",
    "state",
    "typeSwitch",
    "unknown",
    "validation",
    "virtual",
];

/// Language-level settings shared by every analysis run.
///
/// A value is built once by the host (or loaded from JSON) and handed to the
/// resolver and validator by reference; nothing in the crate keeps global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Type names that resolve without a declaration.
    pub builtins: BTreeSet<String>,
    /// Identifiers that may not name a message, enum, field or variant.
    pub reserved: BTreeSet<String>,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        LanguageConfig {
            builtins: DEFAULT_BUILTINS.iter().map(|s| s.to_string()).collect(),
            reserved: DEFAULT_RESERVED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LanguageConfig {
    /// A configuration with no builtins and no reserved words.
    pub fn empty() -> Self {
        LanguageConfig {
            builtins: BTreeSet::new(),
            reserved: BTreeSet::new(),
        }
    }

    pub fn with_builtin(mut self, name: impl Into<String>) -> Self {
        self.builtins.insert(name.into());
        self
    }

    pub fn with_reserved(mut self, name: impl Into<String>) -> Self {
        self.reserved.insert(name.into());
        self
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Loads a configuration; missing keys fall back to the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
