//! Apply masks, category sets and restriction scopes.
//!
//! A design writes field `f` during a merge when
//! `mask.is_set(f) && scope.allows(f.category())`. The mask is stored with the
//! design; the scope is supplied per call and never persisted, so a caller can
//! ask for "equipment only" without touching the stored mask.

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::constants::FIELD_COUNT;
use crate::types::field::{FieldCategory, FieldId};

bitflags::bitflags! {
    /// Set of field categories, used for scopes and change notifications
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CategorySet: u8 {
        /// Equipped items
        const EQUIPMENT = 1 << 0;
        /// Dyes
        const STAIN = 1 << 1;
        /// Crest visibility
        const CREST = 1 << 2;
        /// Customize bytes
        const CUSTOMIZE = 1 << 3;
        /// Meta toggles
        const META = 1 << 4;
        /// Continuous parameters
        const PARAMETER = 1 << 5;
        /// Material overrides; only appears in notifications
        const MATERIAL = 1 << 6;
        /// Every field category
        const FIELDS = Self::EQUIPMENT.bits()
            | Self::STAIN.bits()
            | Self::CREST.bits()
            | Self::CUSTOMIZE.bits()
            | Self::META.bits()
            | Self::PARAMETER.bits();
    }
}

impl CategorySet {
    /// The flag for a single category
    pub const fn of(category: FieldCategory) -> Self {
        match category {
            FieldCategory::Equipment => Self::EQUIPMENT,
            FieldCategory::Stain => Self::STAIN,
            FieldCategory::Crest => Self::CREST,
            FieldCategory::Customize => Self::CUSTOMIZE,
            FieldCategory::Meta => Self::META,
            FieldCategory::Parameter => Self::PARAMETER,
        }
    }
}

impl From<FieldCategory> for CategorySet {
    fn from(category: FieldCategory) -> Self {
        CategorySet::of(category)
    }
}

/// Transient, call-scoped narrowing of which categories a merge may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestrictionScope(CategorySet);

impl RestrictionScope {
    /// Every field category
    pub const ALL: Self = Self(CategorySet::FIELDS);
    /// Nothing at all
    pub const NONE: Self = Self(CategorySet::empty());
    /// Items, dyes and crests
    pub const EQUIPMENT: Self =
        Self(CategorySet::EQUIPMENT.union(CategorySet::STAIN).union(CategorySet::CREST));
    /// Customize bytes and continuous parameters
    pub const CUSTOMIZATION: Self = Self(CategorySet::CUSTOMIZE.union(CategorySet::PARAMETER));

    /// Scope over an explicit set of categories
    pub const fn from_categories(categories: CategorySet) -> Self {
        Self(categories.intersection(CategorySet::FIELDS))
    }

    /// Whether this scope lets a merge write fields of `category`
    pub const fn allows(self, category: FieldCategory) -> bool {
        self.0.contains(CategorySet::of(category))
    }

    /// Narrow this scope by another one
    pub const fn intersect(self, other: RestrictionScope) -> Self {
        Self(self.0.intersection(other.0))
    }

    /// Widen this scope by another one
    pub const fn union(self, other: RestrictionScope) -> Self {
        Self(self.0.union(other.0))
    }

    /// Categories covered by this scope
    pub const fn categories(self) -> CategorySet {
        self.0
    }

    /// Whether no category is allowed
    pub const fn is_empty(self) -> bool {
        self.0.is_empty()
    }
}

impl Default for RestrictionScope {
    fn default() -> Self {
        Self::ALL
    }
}

const VALID_BITS: u128 = (1u128 << FIELD_COUNT) - 1;

/// Bitset over FieldId: set means "apply", clear means "keep"
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<FieldId>", from = "Vec<FieldId>")]
pub struct ApplyMask(u128);

impl ApplyMask {
    /// Apply nothing
    pub const NONE: ApplyMask = ApplyMask(0);
    /// Apply every field
    pub const ALL: ApplyMask = ApplyMask(VALID_BITS);

    /// Build from raw bits, discarding bits past the catalogue
    pub const fn from_bits_truncate(bits: u128) -> Self {
        ApplyMask(bits & VALID_BITS)
    }

    /// Raw bits
    pub const fn bits(self) -> u128 {
        self.0
    }

    /// Mask with exactly the given fields set
    pub fn from_fields(fields: impl IntoIterator<Item = FieldId>) -> Self {
        fields.into_iter().fold(Self::NONE, |mask, field| mask.with(field))
    }

    /// Mask covering one whole category
    pub fn for_category(category: FieldCategory) -> Self {
        Self::from_fields(category.fields())
    }

    /// Whether the field is marked "apply"
    pub const fn is_set(self, field: FieldId) -> bool {
        self.0 & (1u128 << field.index()) != 0
    }

    /// The effective merge predicate: stored mask and call scope both allow the field
    pub const fn should_apply(self, field: FieldId, scope: RestrictionScope) -> bool {
        self.is_set(field) && scope.allows(field.category())
    }

    /// Set or clear a field. Returns whether the mask changed.
    pub fn set(&mut self, field: FieldId, apply: bool) -> bool {
        let before = self.0;
        if apply {
            self.0 |= 1u128 << field.index();
        } else {
            self.0 &= !(1u128 << field.index());
        }
        before != self.0
    }

    /// Set or clear a whole category. Returns whether the mask changed.
    pub fn set_category(&mut self, category: FieldCategory, apply: bool) -> bool {
        let before = self.0;
        let bits = Self::for_category(category).0;
        if apply {
            self.0 |= bits;
        } else {
            self.0 &= !bits;
        }
        before != self.0
    }

    /// Copy with one more field set
    pub const fn with(self, field: FieldId) -> Self {
        ApplyMask(self.0 | (1u128 << field.index()))
    }

    /// Union of two masks
    pub const fn union(self, other: ApplyMask) -> Self {
        ApplyMask(self.0 | other.0)
    }

    /// Intersection of two masks
    pub const fn intersect(self, other: ApplyMask) -> Self {
        ApplyMask(self.0 & other.0)
    }

    /// Number of fields set
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether no field is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Fields that are set, in index order
    pub fn iter(self) -> impl Iterator<Item = FieldId> {
        FieldId::all().filter(move |field| self.is_set(*field))
    }

    /// Categories touched by the set fields
    pub fn categories(self) -> CategorySet {
        self.iter().fold(CategorySet::empty(), |set, field| set | CategorySet::of(field.category()))
    }
}

impl fmt::Debug for ApplyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<ApplyMask> for Vec<FieldId> {
    fn from(mask: ApplyMask) -> Self {
        mask.iter().collect()
    }
}

impl From<Vec<FieldId>> for ApplyMask {
    fn from(fields: Vec<FieldId>) -> Self {
        ApplyMask::from_fields(fields)
    }
}

impl FromIterator<FieldId> for ApplyMask {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        ApplyMask::from_fields(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::field::{CustomizeIndex, EquipSlot, MetaIndex};

    #[test]
    fn all_covers_every_field() {
        assert_eq!(ApplyMask::ALL.len(), FieldId::COUNT);
        assert!(FieldId::all().all(|f| ApplyMask::ALL.is_set(f)));
    }

    #[test]
    fn scope_narrows_without_touching_mask() {
        let head = FieldId::Equipment(EquipSlot::Head);
        let mask = ApplyMask::NONE.with(head);
        assert!(mask.should_apply(head, RestrictionScope::ALL));
        assert!(mask.should_apply(head, RestrictionScope::EQUIPMENT));
        assert!(!mask.should_apply(head, RestrictionScope::CUSTOMIZATION));
        assert!(!mask.should_apply(head, RestrictionScope::NONE));
        assert!(mask.is_set(head));
    }

    #[test]
    fn meta_toggles_need_an_explicit_scope() {
        let wet = FieldId::Meta(MetaIndex::Wetness);
        assert!(RestrictionScope::ALL.allows(wet.category()));
        assert!(!RestrictionScope::EQUIPMENT.allows(wet.category()));
        assert!(!RestrictionScope::CUSTOMIZATION.allows(wet.category()));
    }

    #[test]
    fn set_category_reports_change() {
        let mut mask = ApplyMask::NONE;
        assert!(mask.set_category(FieldCategory::Customize, true));
        assert!(!mask.set_category(FieldCategory::Customize, true));
        assert!(mask.is_set(FieldId::Customize(CustomizeIndex::Clan)));
        assert_eq!(mask.categories(), CategorySet::CUSTOMIZE);
    }

    #[test]
    fn serializes_as_field_list() {
        let mask = ApplyMask::from_fields([
            FieldId::Equipment(EquipSlot::Body),
            FieldId::Meta(MetaIndex::HatState),
        ]);
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, r#"[{"Equipment":"Body"},{"Meta":"HatState"}]"#);
        let back: ApplyMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
    }
}
