//! Analysis subjects and analysis results.

use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::error::{AnalysisError, Result};
use super::field::{Field, FieldKind};
use crate::mappings::{RegionError, RegionSet};

/// Known function entry points, by address.
pub type FunctionNames = BTreeMap<u64, String>;

/// A candidate record: raw bytes captured at `address`.
#[derive(Debug, Clone)]
pub struct Structure {
    address: u64,
    bytes: Bytes,
    function_names: Option<Arc<FunctionNames>>,
}

impl Structure {
    pub fn new(address: u64, bytes: impl Into<Bytes>) -> Self {
        Self {
            address,
            bytes: bytes.into(),
            function_names: None,
        }
    }

    /// Capture `len` bytes at `address` from a region set.
    pub fn from_region_set(
        regions: &RegionSet,
        address: u64,
        len: usize,
    ) -> std::result::Result<Self, RegionError> {
        Ok(Self::new(address, regions.read_bytes(address, len)?))
    }

    /// Attach function names used to annotate pointers to code.
    pub fn with_function_names(mut self, names: Arc<FunctionNames>) -> Self {
        self.function_names = Some(names);
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn function_name(&self, address: u64) -> Option<&str> {
        self.function_names
            .as_ref()
            .and_then(|names| names.get(&address))
            .map(String::as_str)
    }
}

/// Field tiling of one structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzedStructure {
    pub address: u64,
    pub size: usize,
    /// Fields sorted by offset, covering `[0, size)` exactly once
    pub fields: Vec<Field>,
}

impl AnalyzedStructure {
    /// Check that the fields tile `[0, size)` without holes or overlaps.
    pub fn verify_tiling(&self) -> Result<()> {
        let mut next = 0usize;
        for field in &self.fields {
            if field.offset < next {
                return Err(AnalysisError::OverlappingFields {
                    offset: field.offset,
                    previous_end: next,
                });
            }
            if field.offset > next || field.size == 0 {
                return Err(AnalysisError::IncompleteTiling { offset: next });
            }
            next = field.end();
        }
        if next != self.size {
            return Err(AnalysisError::IncompleteTiling { offset: next });
        }
        Ok(())
    }

    pub fn fields_of_kind(&self, kind: FieldKind) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.kind == kind)
    }

    pub fn field_at(&self, offset: usize) -> Option<&Field> {
        self.fields.iter().find(|f| f.offset == offset)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Multi-line listing, one field per line.
    pub fn render(&self, structure: &Structure) -> String {
        let mut out = format!("struct @ {:#x} ({} bytes)\n", self.address, self.size);
        for field in &self.fields {
            out.push_str("  ");
            out.push_str(&field.render(structure.bytes()));
            out.push('\n');
        }
        out
    }
}

pub(crate) fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}
