//! Persisted design format
//!
//! A [`DesignFile`] is what a storage collaborator writes to disk. The functions
//! here only convert between the struct and bytes; they never touch the
//! filesystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::constants::DESIGN_FILE_VERSION;
use crate::design::document::DesignDocument;
use crate::design::links::{LinkGraph, LinkPosition};
use crate::design::material::MaterialDesign;
use crate::types::{AppearanceRecord, ApplyMask, DesignId, Error, RestrictionScope, Result};

/// A persisted link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Linked design
    pub target: DesignId,
    /// Side of the owner
    pub position: LinkPosition,
    /// Categories the linked design contributes
    #[serde(default)]
    pub scope: RestrictionScope,
}

/// A design as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignFile {
    /// Format version
    pub version: u8,
    /// Design identifier
    pub id: DesignId,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Quick design flag
    #[serde(default = "default_quick_design")]
    pub quick_design: bool,
    /// Write protection
    #[serde(default)]
    pub write_protected: bool,
    /// Stored values
    pub record: AppearanceRecord,
    /// Applied fields, stored as a list of field identifiers
    pub mask: ApplyMask,
    /// Outgoing links
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    /// Material overrides
    #[serde(default)]
    pub materials: MaterialDesign,
}

fn default_quick_design() -> bool {
    true
}

impl DesignFile {
    /// Capture a document and its outgoing links
    pub fn from_document(document: &DesignDocument, graph: &LinkGraph) -> Self {
        let links = graph
            .all_links(document.id())
            .map(|(position, link)| LinkRecord { target: link.target, position, scope: link.scope })
            .collect();
        Self {
            version: DESIGN_FILE_VERSION,
            id: document.id(),
            name: document.name().to_string(),
            description: document.description().to_string(),
            tags: document.tags().to_vec(),
            created_at: document.created_at(),
            updated_at: document.updated_at(),
            quick_design: document.quick_design(),
            write_protected: document.write_protected(),
            record: *document.record(),
            mask: document.mask(),
            links,
            materials: document.materials().clone(),
        }
    }

    /// Split into a document and the links still to be inserted
    pub fn into_document(self) -> Result<(DesignDocument, Vec<LinkRecord>)> {
        self.check_version()?;
        let mut document = DesignDocument::with_id(self.id, self.name, self.record, self.mask);
        document.restore_metadata(
            self.description,
            self.tags,
            self.quick_design,
            self.created_at,
            self.updated_at,
            self.materials,
            self.write_protected,
        );
        Ok((document, self.links))
    }

    fn check_version(&self) -> Result<()> {
        if self.version > DESIGN_FILE_VERSION {
            return Err(Error::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Serialize as pretty JSON
pub fn to_json(file: &DesignFile) -> Result<String> {
    Ok(serde_json::to_string_pretty(file)?)
}

/// Parse JSON, refusing files from a newer format version
pub fn from_json(json: &str) -> Result<DesignFile> {
    let file: DesignFile = serde_json::from_str(json)?;
    file.check_version()?;
    Ok(file)
}

/// Serialize as MessagePack with named fields
pub fn to_msgpack(file: &DesignFile) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(file)?)
}

/// Parse MessagePack, refusing files from a newer format version
pub fn from_msgpack(bytes: &[u8]) -> Result<DesignFile> {
    let file: DesignFile = rmp_serde::from_slice(bytes)?;
    file.check_version()?;
    Ok(file)
}
