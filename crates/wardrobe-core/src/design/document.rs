//! Design documents
//!
//! A design is a named, persisted delta: an [`AppearanceRecord`] plus the
//! [`ApplyMask`] that says which of its fields a merge writes. Changes to the
//! record or mask are transactional and keep the previous (record, mask) pair
//! in a single-slot undo buffer. Write protection is checked in one place,
//! before every mutator.

use chrono::{DateTime, Utc};
use crate::design::material::{ColorRow, MaterialDesign, MaterialKey};
use crate::types::{
    AppearanceRecord, ApplyMask, DesignId, Error, FieldCategory, FieldId, FieldValue, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UndoEntry {
    record: AppearanceRecord,
    mask: ApplyMask,
}

/// Named appearance preset with its own apply mask
#[derive(Debug, Clone)]
pub struct DesignDocument {
    id: DesignId,
    name: String,
    description: String,
    tags: Vec<String>,
    quick_design: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    record: AppearanceRecord,
    mask: ApplyMask,
    materials: MaterialDesign,
    write_protected: bool,
    undo: Option<UndoEntry>,
}

impl DesignDocument {
    /// Create an empty design that applies nothing
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_record(name, AppearanceRecord::default(), ApplyMask::NONE)
    }

    /// Create a design from an existing record and mask
    pub fn with_record(name: impl Into<String>, record: AppearanceRecord, mask: ApplyMask) -> Self {
        Self::with_id(DesignId::random(), name, record, mask)
    }

    /// Create a design with a known identifier (import, clone)
    pub fn with_id(
        id: DesignId,
        name: impl Into<String>,
        record: AppearanceRecord,
        mask: ApplyMask,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            quick_design: true,
            created_at: now,
            updated_at: now,
            record,
            mask,
            materials: MaterialDesign::new(),
            write_protected: false,
            undo: None,
        }
    }

    /// Identifier
    pub fn id(&self) -> DesignId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sorted, de-duplicated tags
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the tag is present
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.binary_search_by(|t| t.as_str().cmp(tag)).is_ok()
    }

    /// Whether the design shows up in quick-apply lists
    pub fn quick_design(&self) -> bool {
        self.quick_design
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last mutation
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Stored values
    pub fn record(&self) -> &AppearanceRecord {
        &self.record
    }

    /// Stored apply mask
    pub fn mask(&self) -> ApplyMask {
        self.mask
    }

    /// Material overrides
    pub fn materials(&self) -> &MaterialDesign {
        &self.materials
    }

    /// Whether every mutator except [`set_write_protected`](Self::set_write_protected) is refused
    pub fn write_protected(&self) -> bool {
        self.write_protected
    }

    /// Whether an undo entry is available
    pub fn can_undo(&self) -> bool {
        self.undo.is_some()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.write_protected {
            return Err(Error::WriteProtected(self.id));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Commit a new (record, mask) pair, keeping the old one for undo
    fn commit(&mut self, record: AppearanceRecord, mask: ApplyMask) -> bool {
        if record == self.record && mask == self.mask {
            return false;
        }
        self.undo = Some(UndoEntry { record: self.record, mask: self.mask });
        self.record = record;
        self.mask = mask;
        self.touch();
        true
    }

    /// Change one stored value. Returns whether it changed.
    pub fn change_field(&mut self, field: FieldId, value: FieldValue) -> Result<bool> {
        self.ensure_writable()?;
        let mut record = self.record;
        record.set(field, value)?;
        Ok(self.commit(record, self.mask))
    }

    /// Change whether one field is applied. Returns whether it changed.
    pub fn change_apply(&mut self, field: FieldId, apply: bool) -> Result<bool> {
        self.ensure_writable()?;
        let mut mask = self.mask;
        mask.set(field, apply);
        Ok(self.commit(self.record, mask))
    }

    /// Change the apply flag of every field in a category as one undo step
    pub fn change_category_apply(&mut self, category: FieldCategory, apply: bool) -> Result<bool> {
        self.ensure_writable()?;
        let mut mask = self.mask;
        mask.set_category(category, apply);
        Ok(self.commit(self.record, mask))
    }

    /// Copy the masked fields of another record into this design and mark them applied.
    ///
    /// The whole merge is one undo step.
    pub fn merge_from(&mut self, record: &AppearanceRecord, mask: ApplyMask) -> Result<bool> {
        self.ensure_writable()?;
        let mut next = self.record;
        for field in mask.iter() {
            next.copy_field(field, record);
        }
        Ok(self.commit(next, self.mask.union(mask)))
    }

    /// Restore the (record, mask) pair from before the last change
    pub fn undo(&mut self) -> Result<bool> {
        self.ensure_writable()?;
        match self.undo.take() {
            Some(entry) => {
                self.record = entry.record;
                self.mask = entry.mask;
                self.touch();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rename the design
    pub fn rename(&mut self, name: impl Into<String>) -> Result<bool> {
        self.ensure_writable()?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_state("design name must not be empty"));
        }
        if name == self.name {
            return Ok(false);
        }
        self.name = name;
        self.touch();
        Ok(true)
    }

    /// Replace the description
    pub fn set_description(&mut self, description: impl Into<String>) -> Result<bool> {
        self.ensure_writable()?;
        let description = description.into();
        if description == self.description {
            return Ok(false);
        }
        self.description = description;
        self.touch();
        Ok(true)
    }

    /// Add a tag; surrounding whitespace is ignored
    pub fn add_tag(&mut self, tag: &str) -> Result<bool> {
        self.ensure_writable()?;
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::invalid_state("tag must not be empty"));
        }
        match self.tags.binary_search_by(|t| t.as_str().cmp(tag)) {
            Ok(_) => Ok(false),
            Err(pos) => {
                self.tags.insert(pos, tag.to_string());
                self.touch();
                Ok(true)
            }
        }
    }

    /// Remove a tag
    pub fn remove_tag(&mut self, tag: &str) -> Result<bool> {
        self.ensure_writable()?;
        match self.tags.binary_search_by(|t| t.as_str().cmp(tag.trim())) {
            Ok(pos) => {
                self.tags.remove(pos);
                self.touch();
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Show or hide the design in quick-apply lists
    pub fn set_quick_design(&mut self, quick: bool) -> Result<bool> {
        self.ensure_writable()?;
        if quick == self.quick_design {
            return Ok(false);
        }
        self.quick_design = quick;
        self.touch();
        Ok(true)
    }

    /// Set or remove a material override
    pub fn change_material(&mut self, key: MaterialKey, value: Option<ColorRow>) -> Result<bool> {
        self.ensure_writable()?;
        let changed = self.materials.set(key, value);
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    /// Enable or disable a material override
    pub fn set_material_enabled(&mut self, key: &MaterialKey, enabled: bool) -> Result<bool> {
        self.ensure_writable()?;
        let changed = self.materials.set_enabled(key, enabled);
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    /// Toggle write protection. This is the only mutator allowed on a protected design.
    pub fn set_write_protected(&mut self, protected: bool) -> bool {
        if protected == self.write_protected {
            return false;
        }
        self.write_protected = protected;
        self.touch();
        true
    }

    pub(crate) fn restore_metadata(
        &mut self,
        description: String,
        tags: Vec<String>,
        quick_design: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        materials: MaterialDesign,
        write_protected: bool,
    ) {
        let mut tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        self.description = description;
        self.tags = tags;
        self.quick_design = quick_design;
        self.created_at = created_at;
        self.updated_at = updated_at;
        self.materials = materials;
        self.write_protected = write_protected;
    }

    pub(crate) fn set_id(&mut self, id: DesignId) {
        self.id = id;
    }

    pub(crate) fn clear_undo(&mut self) {
        self.undo = None;
    }
}
