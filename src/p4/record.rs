//! Record type for entries parsed from tagged command output.

use serde::{Deserialize, Serialize};

/// One file entry parsed from tagged (`-ztag`) output.
///
/// All fields are kept as opaque text; the server owns their vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotFile {
    /// Path relative to the stream root, e.g. `Engine/foo.cpp` rather than
    /// `//UE4/Release/Engine/foo.cpp`.
    pub path: String,
    /// Action reported by the server (add, edit, delete, branch, ...),
    /// free-form.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    /// Changelist identifier. Opaque text at this layer.
    #[serde(default, rename = "change", skip_serializing_if = "String::is_empty")]
    pub cl: String,
    /// Server file type. Opaque text at this layer.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub file_type: String,
}

impl DepotFile {
    /// Apply one tagged field to the record.
    ///
    /// `depotFile` values are expected to already be relative to the stream
    /// root; the scanner strips the depot prefix before calling this.
    /// Unrecognized tags are deliberately a no-op so additional fields
    /// emitted by newer servers do not break parsing.
    pub fn apply_tag(&mut self, tag: &str, value: &str) {
        match tag {
            "depotFile" => self.path = value.to_string(),
            "action" => self.action = value.to_string(),
            "change" => self.cl = value.to_string(),
            "type" => self.file_type = value.to_string(),
            _ => {}
        }
    }
}
