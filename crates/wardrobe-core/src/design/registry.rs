//! Document lifecycle and change events
//!
//! The registry owns every [`DesignDocument`] and the [`LinkGraph`] between
//! them. Each successful mutation publishes a [`DesignEvent`]; operations that
//! turn out to change nothing stay silent.

use std::collections::HashMap;
use tracing::{debug, info, warn};
use crate::design::document::DesignDocument;
use crate::design::file::{DesignFile, LinkRecord};
use crate::design::links::{Link, LinkGraph, LinkPosition};
use crate::design::material::{ColorRow, MaterialKey};
use crate::events::{DesignChange, DesignEvent, EventBus};
use crate::state::merge::{DesignLayer, MergePlan};
use crate::types::{
    AppearanceRecord, ApplyMask, DesignId, Error, FieldCategory, FieldId, FieldValue,
    RestrictionScope, Result,
};

/// Owner of all design documents
#[derive(Default)]
pub struct DesignRegistry {
    documents: HashMap<DesignId, DesignDocument>,
    graph: LinkGraph,
    events: EventBus<DesignEvent>,
}

impl DesignRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription to design changes
    pub fn subscribe(&self) -> flume::Receiver<DesignEvent> {
        self.events.subscribe()
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Look up a document
    pub fn get(&self, id: DesignId) -> Option<&DesignDocument> {
        self.documents.get(&id)
    }

    /// The link graph
    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    fn publish(&self, design: DesignId, change: DesignChange) {
        self.events.publish(DesignEvent { design, change });
    }

    fn insert(&mut self, document: DesignDocument) -> DesignId {
        let id = document.id();
        info!("Added design {} ({})", document.name(), id);
        self.graph.insert_node(id);
        self.documents.insert(id, document);
        self.publish(id, DesignChange::Created);
        id
    }

    /// Run a document mutator and publish `change` if it reports a change
    fn mutate(
        &mut self,
        id: DesignId,
        change: DesignChange,
        f: impl FnOnce(&mut DesignDocument) -> Result<bool>,
    ) -> Result<bool> {
        let document = self.documents.get_mut(&id).ok_or_else(|| Error::missing_design(id))?;
        let changed = f(document)?;
        if changed {
            debug!("Design {} changed: {:?}", id, change);
            self.publish(id, change);
        }
        Ok(changed)
    }

    fn ensure_writable(&self, id: DesignId) -> Result<()> {
        match self.documents.get(&id) {
            Some(document) if document.write_protected() => Err(Error::WriteProtected(id)),
            Some(_) => Ok(()),
            None => Err(Error::missing_design(id)),
        }
    }

    /// Create an empty design
    pub fn create(&mut self, name: impl Into<String>) -> DesignId {
        self.insert(DesignDocument::new(name))
    }

    /// Create a design from a record and mask
    pub fn create_from(
        &mut self,
        name: impl Into<String>,
        record: AppearanceRecord,
        mask: ApplyMask,
    ) -> DesignId {
        self.insert(DesignDocument::with_record(name, record, mask))
    }

    /// Copy a design under a new name, including its outgoing links
    pub fn clone_design(&mut self, id: DesignId, name: impl Into<String>) -> Result<DesignId> {
        let source = self.documents.get(&id).ok_or_else(|| Error::missing_design(id))?;
        let mut copy = source.clone();
        copy.set_id(DesignId::random());
        copy.set_write_protected(false);
        copy.rename(name)?;
        copy.clear_undo();
        let links: Vec<(LinkPosition, Link)> = self.graph.all_links(id).collect();

        let new_id = self.insert(copy);
        for (position, link) in links {
            self.graph.add_link(new_id, link.target, position, link.scope)?;
        }
        Ok(new_id)
    }

    /// Import a persisted design. A colliding identifier is replaced by a fresh one.
    ///
    /// Links to designs that are not present are skipped.
    pub fn import(&mut self, file: DesignFile) -> Result<DesignId> {
        let (id, links) = self.import_document(file)?;
        self.insert_links(id, &links);
        Ok(id)
    }

    fn import_document(&mut self, file: DesignFile) -> Result<(DesignId, Vec<LinkRecord>)> {
        let (mut document, links) = file.into_document()?;
        if self.documents.contains_key(&document.id()) {
            let fresh = DesignId::random();
            warn!("Design {} already exists, importing as {}", document.id(), fresh);
            document.set_id(fresh);
        }
        Ok((self.insert(document), links))
    }

    fn insert_links(&mut self, owner: DesignId, links: &[LinkRecord]) {
        for link in links {
            match self.graph.add_link(owner, link.target, link.position, link.scope) {
                Ok(()) => {}
                Err(err) => warn!("Skipped link {} -> {}: {}", owner, link.target, err),
            }
        }
    }

    /// Load many persisted designs. All documents go in before any link, so
    /// links between the loaded designs resolve regardless of order.
    ///
    /// Files that fail to load are logged and skipped.
    pub fn load_files(&mut self, files: impl IntoIterator<Item = DesignFile>) -> Vec<DesignId> {
        let mut pending = Vec::new();
        for file in files {
            let name = file.name.clone();
            match self.import_document(file) {
                Ok(entry) => pending.push(entry),
                Err(err) => warn!("Failed to load design {}: {}", name, err),
            }
        }
        for (id, links) in &pending {
            self.insert_links(*id, links);
        }
        info!("Loaded {} designs", pending.len());
        pending.into_iter().map(|(id, _)| id).collect()
    }

    /// Persisted form of a design
    pub fn export(&self, id: DesignId) -> Result<DesignFile> {
        let document = self.documents.get(&id).ok_or_else(|| Error::missing_design(id))?;
        Ok(DesignFile::from_document(document, &self.graph))
    }

    /// Delete a design and every link pointing at it
    pub fn delete(&mut self, id: DesignId) -> Result<DesignDocument> {
        let document = self.documents.remove(&id).ok_or_else(|| Error::missing_design(id))?;
        let pruned = self.graph.remove_node(id).unwrap_or(0);
        info!("Deleted design {} ({}), pruned {} links", document.name(), id, pruned);
        self.publish(id, DesignChange::Deleted);
        Ok(document)
    }

    /// Rename a design
    pub fn rename(&mut self, id: DesignId, name: impl Into<String>) -> Result<bool> {
        self.mutate(id, DesignChange::Renamed, |d| d.rename(name))
    }

    /// Replace a design's description
    pub fn change_description(
        &mut self,
        id: DesignId,
        description: impl Into<String>,
    ) -> Result<bool> {
        self.mutate(id, DesignChange::Description, |d| d.set_description(description))
    }

    /// Add a tag
    pub fn add_tag(&mut self, id: DesignId, tag: &str) -> Result<bool> {
        self.mutate(id, DesignChange::Tags, |d| d.add_tag(tag))
    }

    /// Remove a tag
    pub fn remove_tag(&mut self, id: DesignId, tag: &str) -> Result<bool> {
        self.mutate(id, DesignChange::Tags, |d| d.remove_tag(tag))
    }

    /// Show or hide a design in quick-apply lists
    pub fn set_quick_design(&mut self, id: DesignId, quick: bool) -> Result<bool> {
        self.mutate(id, DesignChange::QuickDesign, |d| d.set_quick_design(quick))
    }

    /// Toggle write protection
    pub fn set_write_protection(&mut self, id: DesignId, protected: bool) -> Result<bool> {
        self.mutate(id, DesignChange::WriteProtection, |d| Ok(d.set_write_protected(protected)))
    }

    /// Change a stored value
    pub fn change_field(
        &mut self,
        id: DesignId,
        field: FieldId,
        value: FieldValue,
    ) -> Result<bool> {
        self.mutate(id, DesignChange::Field(field), |d| d.change_field(field, value))
    }

    /// Change whether a field is applied
    pub fn change_apply(&mut self, id: DesignId, field: FieldId, apply: bool) -> Result<bool> {
        self.mutate(id, DesignChange::Apply(field), |d| d.change_apply(field, apply))
    }

    /// Change whether a whole category is applied
    pub fn change_category_apply(
        &mut self,
        id: DesignId,
        category: FieldCategory,
        apply: bool,
    ) -> Result<bool> {
        self.mutate(id, DesignChange::ApplyCategory(category), |d| {
            d.change_category_apply(category, apply)
        })
    }

    /// Merge a record into a design as one undo step
    pub fn merge_into(
        &mut self,
        id: DesignId,
        record: &AppearanceRecord,
        mask: ApplyMask,
    ) -> Result<bool> {
        self.mutate(id, DesignChange::Merged, |d| d.merge_from(record, mask))
    }

    /// Set or remove a material override
    pub fn change_material(
        &mut self,
        id: DesignId,
        key: MaterialKey,
        value: Option<ColorRow>,
    ) -> Result<bool> {
        self.mutate(id, DesignChange::Material, |d| d.change_material(key, value))
    }

    /// Enable or disable a material override
    pub fn set_material_enabled(
        &mut self,
        id: DesignId,
        key: MaterialKey,
        enabled: bool,
    ) -> Result<bool> {
        self.mutate(id, DesignChange::Material, |d| d.set_material_enabled(&key, enabled))
    }

    /// Undo the last record or mask change
    pub fn undo(&mut self, id: DesignId) -> Result<bool> {
        self.mutate(id, DesignChange::Undo, |d| d.undo())
    }

    /// Link `target` into `owner` on `position`
    pub fn add_link(
        &mut self,
        owner: DesignId,
        target: DesignId,
        position: LinkPosition,
        scope: RestrictionScope,
    ) -> Result<()> {
        self.ensure_writable(owner)?;
        self.graph.add_link(owner, target, position, scope)?;
        self.links_changed(owner);
        Ok(())
    }

    /// Remove a link
    pub fn remove_link(
        &mut self,
        owner: DesignId,
        target: DesignId,
        position: LinkPosition,
    ) -> Result<bool> {
        self.ensure_writable(owner)?;
        let removed = self.graph.remove_link(owner, target, position);
        if removed {
            self.links_changed(owner);
        }
        Ok(removed)
    }

    /// Reorder a link within one list
    pub fn move_link(
        &mut self,
        owner: DesignId,
        position: LinkPosition,
        from: usize,
        to: usize,
    ) -> Result<bool> {
        self.ensure_writable(owner)?;
        let moved = self.graph.move_link(owner, position, from, to)?;
        if moved {
            self.links_changed(owner);
        }
        Ok(moved)
    }

    /// Links of a design on one side
    pub fn links(&self, owner: DesignId, position: LinkPosition) -> &[Link] {
        self.graph.links(owner, position)
    }

    fn links_changed(&mut self, owner: DesignId) {
        self.publish(owner, DesignChange::Links);
    }

    /// All designs sorted by name
    pub fn list(&self) -> Vec<&DesignDocument> {
        let mut documents: Vec<&DesignDocument> = self.documents.values().collect();
        documents.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(&b.id())));
        documents
    }

    /// First design (in name order) whose name matches, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<&DesignDocument> {
        self.list().into_iter().find(|d| d.name().eq_ignore_ascii_case(name))
    }

    /// Resolve a design and its links into merge layers
    pub fn merge_plan(&self, id: DesignId) -> Result<MergePlan> {
        let resolved = self.graph.resolve(id)?;
        let mut layers = Vec::with_capacity(resolved.len());
        let mut owner = 0;
        for (design, scope) in resolved {
            let document = self
                .documents
                .get(&design)
                .ok_or_else(|| Error::missing_design(design))?;
            if design == id {
                owner = layers.len();
            }
            layers.push(DesignLayer::from_document(document, scope));
        }
        MergePlan::new(layers, owner)
    }
}
