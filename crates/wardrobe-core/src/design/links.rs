//! Before/after composition between designs.
//!
//! Nodes live in an arena indexed by position; a `HashMap` maps stable design
//! identifiers to arena slots. Edges store the target's identifier, never its
//! slot, so removing a node only has to prune edges that name it.
//!
//! The graph is kept acyclic on insertion: an edge `owner -> target` is refused
//! when `owner` is already reachable from `target` over any link.

use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use crate::types::{DesignId, Error, RestrictionScope, Result};

/// Which side of the owner a linked design is applied on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkPosition {
    /// Applied before the owner, so the owner wins on overlap
    Before,
    /// Applied after the owner, so the linked design wins on overlap
    After,
}

/// One edge of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Linked design
    pub target: DesignId,
    /// Categories the linked design may contribute
    pub scope: RestrictionScope,
}

#[derive(Debug)]
struct Node {
    id: DesignId,
    before: Vec<Link>,
    after: Vec<Link>,
}

impl Node {
    fn list(&self, position: LinkPosition) -> &Vec<Link> {
        match position {
            LinkPosition::Before => &self.before,
            LinkPosition::After => &self.after,
        }
    }

    fn list_mut(&mut self, position: LinkPosition) -> &mut Vec<Link> {
        match position {
            LinkPosition::Before => &mut self.before,
            LinkPosition::After => &mut self.after,
        }
    }

    fn targets(&self) -> impl Iterator<Item = DesignId> + '_ {
        self.before.iter().chain(self.after.iter()).map(|l| l.target)
    }
}

/// Link graph over design identifiers
#[derive(Debug, Default)]
pub struct LinkGraph {
    index: HashMap<DesignId, usize>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl LinkGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether the design has a node
    pub fn contains(&self, id: DesignId) -> bool {
        self.index.contains_key(&id)
    }

    fn node(&self, id: DesignId) -> Option<&Node> {
        self.index.get(&id).and_then(|&slot| self.nodes[slot].as_ref())
    }

    fn node_mut(&mut self, id: DesignId) -> Option<&mut Node> {
        match self.index.get(&id) {
            Some(&slot) => self.nodes[slot].as_mut(),
            None => None,
        }
    }

    /// Add a node without links. Returns `false` if it already existed.
    pub fn insert_node(&mut self, id: DesignId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        let node = Node { id, before: Vec::new(), after: Vec::new() };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(id, slot);
        true
    }

    /// Remove a node together with every link that points at it.
    ///
    /// Returns the number of pruned incoming links, or `None` if the node did not exist.
    pub fn remove_node(&mut self, id: DesignId) -> Option<usize> {
        let slot = self.index.remove(&id)?;
        self.nodes[slot] = None;
        self.free.push(slot);

        let mut pruned = 0;
        for node in self.nodes.iter_mut().flatten() {
            let before = node.before.len() + node.after.len();
            node.before.retain(|l| l.target != id);
            node.after.retain(|l| l.target != id);
            pruned += before - node.before.len() - node.after.len();
        }
        Some(pruned)
    }

    /// Links of `owner` on one side, in application order
    pub fn links(&self, owner: DesignId, position: LinkPosition) -> &[Link] {
        self.node(owner).map(|n| n.list(position).as_slice()).unwrap_or(&[])
    }

    /// Every link of `owner` with its side
    pub fn all_links(&self, owner: DesignId) -> impl Iterator<Item = (LinkPosition, Link)> + '_ {
        let node = self.node(owner);
        let before = node
            .into_iter()
            .flat_map(|n| n.before.iter().map(|l| (LinkPosition::Before, *l)));
        let after = node
            .into_iter()
            .flat_map(|n| n.after.iter().map(|l| (LinkPosition::After, *l)));
        before.chain(after)
    }

    /// Add a link at the end of `owner`'s list on `position`.
    pub fn add_link(
        &mut self,
        owner: DesignId,
        target: DesignId,
        position: LinkPosition,
        scope: RestrictionScope,
    ) -> Result<()> {
        if owner == target {
            return Err(Error::CycleRejected { owner, target });
        }
        let node = self.node(owner).ok_or_else(|| Error::missing_design(owner))?;
        if !self.contains(target) {
            return Err(Error::missing_design(target));
        }
        if node.list(position).iter().any(|l| l.target == target) {
            return Err(Error::DuplicateLink { owner, target });
        }
        if self.reaches(target, owner) {
            return Err(Error::CycleRejected { owner, target });
        }

        if let Some(node) = self.node_mut(owner) {
            node.list_mut(position).push(Link { target, scope });
        }
        Ok(())
    }

    /// Remove a link. Returns whether it existed.
    pub fn remove_link(
        &mut self,
        owner: DesignId,
        target: DesignId,
        position: LinkPosition,
    ) -> bool {
        match self.node_mut(owner) {
            Some(node) => {
                let list = node.list_mut(position);
                let len = list.len();
                list.retain(|l| l.target != target);
                list.len() != len
            }
            None => false,
        }
    }

    /// Move a link within one list
    pub fn move_link(
        &mut self,
        owner: DesignId,
        position: LinkPosition,
        from: usize,
        to: usize,
    ) -> Result<bool> {
        let node = self.node_mut(owner).ok_or_else(|| Error::missing_design(owner))?;
        let list = node.list_mut(position);
        if from >= list.len() || to >= list.len() {
            return Err(Error::invalid_state(format!(
                "link index out of range: {} -> {} of {}",
                from,
                to,
                list.len()
            )));
        }
        if from == to {
            return Ok(false);
        }
        let link = list.remove(from);
        list.insert(to, link);
        Ok(true)
    }

    /// Whether `goal` is reachable from `start` over any link.
    ///
    /// Visits each node at most once, so the walk is bounded by the node count.
    pub fn reaches(&self, start: DesignId, goal: DesignId) -> bool {
        let mut visited = HashSet::with_capacity(self.len() + 1);
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id == goal {
                return true;
            }
            if !visited.insert(id) || visited.len() > self.len() + 1 {
                continue;
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.targets());
            }
        }
        false
    }

    /// Flatten `owner` and its links into application order.
    ///
    /// Before-links come first (recursively), then the owner, then
    /// after-links. Scopes narrow down each chain. A design that is already in
    /// the sequence is skipped when it is reached again.
    pub fn resolve(&self, owner: DesignId) -> Result<Vec<(DesignId, RestrictionScope)>> {
        if !self.contains(owner) {
            return Err(Error::missing_design(owner));
        }
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.flatten(owner, RestrictionScope::ALL, &mut visited, &mut out);
        Ok(out)
    }

    fn flatten(
        &self,
        id: DesignId,
        scope: RestrictionScope,
        visited: &mut HashSet<DesignId>,
        out: &mut Vec<(DesignId, RestrictionScope)>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let Some(node) = self.node(id) else {
            return;
        };
        for link in &node.before {
            self.flatten(link.target, scope.intersect(link.scope), visited, out);
        }
        out.push((node.id, scope));
        for link in &node.after {
            self.flatten(link.target, scope.intersect(link.scope), visited, out);
        }
    }
}
