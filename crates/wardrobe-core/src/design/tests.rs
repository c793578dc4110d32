use super::*;
use super::file::{from_json, from_msgpack, to_json, to_msgpack};
use crate::events::DesignChange;
use crate::types::{
    AppearanceRecord, ApplyMask, CustomizeIndex, DesignId, EquipSlot, Error, FieldCategory, FieldId,
    FieldValue, ItemId, ParamValue, RestrictionScope,
};

fn head_field() -> FieldId {
    FieldId::Equipment(EquipSlot::Head)
}

#[test]
fn change_field_then_undo_restores() {
    let mut document = DesignDocument::new("Casual");
    let before = *document.record();
    assert!(!document.can_undo());

    assert!(document.change_field(head_field(), FieldValue::Item(ItemId(10))).unwrap());
    assert!(document.can_undo());
    assert_eq!(document.record().item(EquipSlot::Head), ItemId(10));

    assert!(document.undo().unwrap());
    assert_eq!(*document.record(), before);
    assert!(!document.can_undo());
    assert!(!document.undo().unwrap());
}

#[test]
fn undo_keeps_only_the_last_step() {
    let mut document = DesignDocument::new("Casual");
    document.change_field(head_field(), FieldValue::Item(ItemId(1))).unwrap();
    document.change_apply(head_field(), true).unwrap();
    document.undo().unwrap();
    assert_eq!(document.record().item(EquipSlot::Head), ItemId(1));
    assert!(!document.mask().is_set(head_field()));
}

#[test]
fn unchanged_value_does_not_consume_undo() {
    let mut document = DesignDocument::new("Casual");
    assert!(!document.change_field(head_field(), FieldValue::Item(ItemId::NOTHING)).unwrap());
    assert!(!document.can_undo());
}

#[test]
fn wrong_value_type_is_rejected() {
    let mut document = DesignDocument::new("Casual");
    let err = document.change_field(head_field(), FieldValue::Customize(3)).unwrap_err();
    assert!(matches!(err, Error::CategoryMismatch { .. }));
    assert!(!document.can_undo());
}

#[test]
fn category_apply_is_one_undo_step() {
    let mut document = DesignDocument::new("Hair");
    assert!(document.change_category_apply(FieldCategory::Customize, true).unwrap());
    assert_eq!(document.mask(), ApplyMask::for_category(FieldCategory::Customize));
    document.undo().unwrap();
    assert!(document.mask().is_empty());
}

#[test]
fn merge_from_copies_masked_fields() {
    let mut document = DesignDocument::new("Merged");
    let mut other = AppearanceRecord::default();
    other.set_item(EquipSlot::Body, ItemId(7));
    other.set_customize(CustomizeIndex::Hairstyle, 12);
    let mask = ApplyMask::NONE.with(FieldId::Equipment(EquipSlot::Body));

    assert!(document.merge_from(&other, mask).unwrap());
    assert_eq!(document.record().item(EquipSlot::Body), ItemId(7));
    assert_eq!(document.record().customize(CustomizeIndex::Hairstyle), 0);
    assert_eq!(document.mask(), mask);
}

#[test]
fn write_protection_blocks_every_mutator() {
    let mut document = DesignDocument::new("Locked");
    assert!(document.set_write_protected(true));
    let change = document.change_field(head_field(), FieldValue::Item(ItemId(1)));
    assert!(matches!(change, Err(Error::WriteProtected(_))));
    assert!(matches!(document.change_apply(head_field(), true), Err(Error::WriteProtected(_))));
    assert!(matches!(document.rename("Other"), Err(Error::WriteProtected(_))));
    assert!(matches!(document.add_tag("x"), Err(Error::WriteProtected(_))));
    assert!(matches!(document.undo(), Err(Error::WriteProtected(_))));
    assert!(document.set_write_protected(false));
    assert!(document.rename("Other").unwrap());
}

#[test]
fn tags_are_sorted_and_unique() {
    let mut document = DesignDocument::new("Tagged");
    document.add_tag("summer").unwrap();
    document.add_tag(" beach ").unwrap();
    assert!(!document.add_tag("summer").unwrap());
    assert_eq!(document.tags(), ["beach".to_string(), "summer".to_string()]);
    assert!(document.remove_tag("beach").unwrap());
    assert!(!document.has_tag("beach"));
}

#[test]
fn link_cycle_is_rejected() {
    let (a, b, c) = (DesignId::random(), DesignId::random(), DesignId::random());
    let mut graph = LinkGraph::new();
    for id in [a, b, c] {
        graph.insert_node(id);
    }
    graph.add_link(a, b, LinkPosition::After, RestrictionScope::ALL).unwrap();
    graph.add_link(b, c, LinkPosition::After, RestrictionScope::ALL).unwrap();

    let err = graph.add_link(c, a, LinkPosition::Before, RestrictionScope::ALL).unwrap_err();
    assert!(matches!(err, Error::CycleRejected { .. }));
    let self_link = graph.add_link(a, a, LinkPosition::After, RestrictionScope::ALL);
    assert!(matches!(self_link, Err(Error::CycleRejected { .. })));
    assert!(graph.links(c, LinkPosition::Before).is_empty());
}

#[test]
fn closing_a_cycle_on_either_side_is_rejected() {
    let (a, b, c) = (DesignId::random(), DesignId::random(), DesignId::random());
    let mut graph = LinkGraph::new();
    for id in [a, b, c] {
        graph.insert_node(id);
    }
    graph.add_link(a, b, LinkPosition::Before, RestrictionScope::ALL).unwrap();
    graph.add_link(b, c, LinkPosition::After, RestrictionScope::ALL).unwrap();

    let err = graph.add_link(c, a, LinkPosition::After, RestrictionScope::ALL).unwrap_err();
    assert!(matches!(err, Error::CycleRejected { .. }));
    assert!(graph.links(c, LinkPosition::After).is_empty());
    assert!(graph.links(c, LinkPosition::Before).is_empty());
}

#[test]
fn duplicate_and_dangling_links_are_rejected() {
    let (a, b) = (DesignId::random(), DesignId::random());
    let mut graph = LinkGraph::new();
    graph.insert_node(a);
    graph.insert_node(b);
    graph.add_link(a, b, LinkPosition::Before, RestrictionScope::ALL).unwrap();

    let dup = graph.add_link(a, b, LinkPosition::Before, RestrictionScope::ALL).unwrap_err();
    assert!(matches!(dup, Error::DuplicateLink { .. }));
    let dangling = graph
        .add_link(a, DesignId::random(), LinkPosition::After, RestrictionScope::ALL)
        .unwrap_err();
    assert!(matches!(dangling, Error::InvalidState(_)));
}

#[test]
fn resolve_orders_before_owner_after() {
    let ids: Vec<DesignId> = (0..5).map(|_| DesignId::random()).collect();
    let (owner, before, after, nested, shared) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
    let mut graph = LinkGraph::new();
    for id in &ids {
        graph.insert_node(*id);
    }
    graph.add_link(owner, before, LinkPosition::Before, RestrictionScope::ALL).unwrap();
    graph.add_link(owner, after, LinkPosition::After, RestrictionScope::EQUIPMENT).unwrap();
    graph.add_link(before, nested, LinkPosition::After, RestrictionScope::CUSTOMIZATION).unwrap();
    graph.add_link(before, shared, LinkPosition::Before, RestrictionScope::ALL).unwrap();
    graph.add_link(after, shared, LinkPosition::After, RestrictionScope::ALL).unwrap();

    let resolved = graph.resolve(owner).unwrap();
    let order: Vec<DesignId> = resolved.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, vec![shared, before, nested, owner, after]);
    assert_eq!(resolved[2].1, RestrictionScope::CUSTOMIZATION);
    assert_eq!(resolved[3].1, RestrictionScope::ALL);
    assert_eq!(resolved[4].1, RestrictionScope::EQUIPMENT);
}

#[test]
fn nested_scopes_intersect() {
    let (a, b, c) = (DesignId::random(), DesignId::random(), DesignId::random());
    let mut graph = LinkGraph::new();
    for id in [a, b, c] {
        graph.insert_node(id);
    }
    graph.add_link(a, b, LinkPosition::After, RestrictionScope::EQUIPMENT).unwrap();
    graph.add_link(b, c, LinkPosition::After, RestrictionScope::CUSTOMIZATION).unwrap();
    let resolved = graph.resolve(a).unwrap();
    assert_eq!(resolved[2], (c, RestrictionScope::NONE));
}

#[test]
fn move_link_reorders() {
    let ids: Vec<DesignId> = (0..3).map(|_| DesignId::random()).collect();
    let mut graph = LinkGraph::new();
    for id in &ids {
        graph.insert_node(*id);
    }
    graph.add_link(ids[0], ids[1], LinkPosition::After, RestrictionScope::ALL).unwrap();
    graph.add_link(ids[0], ids[2], LinkPosition::After, RestrictionScope::ALL).unwrap();
    assert!(graph.move_link(ids[0], LinkPosition::After, 1, 0).unwrap());
    assert_eq!(graph.links(ids[0], LinkPosition::After)[0].target, ids[2]);
    assert!(graph.move_link(ids[0], LinkPosition::After, 0, 5).is_err());
}

#[test]
fn delete_prunes_links() {
    let mut registry = DesignRegistry::new();
    let a = registry.create("A");
    let b = registry.create("B");
    registry.add_link(a, b, LinkPosition::After, RestrictionScope::ALL).unwrap();
    registry.delete(b).unwrap();
    assert!(registry.links(a, LinkPosition::After).is_empty());
    assert_eq!(registry.merge_plan(a).unwrap().layers().len(), 1);
}

#[test]
fn registry_publishes_design_events() {
    let mut registry = DesignRegistry::new();
    let rx = registry.subscribe();
    let id = registry.create("Evening");
    registry.change_field(id, head_field(), FieldValue::Item(ItemId(3))).unwrap();
    registry.change_field(id, head_field(), FieldValue::Item(ItemId(3))).unwrap();
    registry.rename(id, "Night").unwrap();

    let changes: Vec<DesignChange> = rx.try_iter().map(|e| e.change).collect();
    let expected = vec![
        DesignChange::Created,
        DesignChange::Field(head_field()),
        DesignChange::Renamed,
    ];
    assert_eq!(changes, expected);
}

#[test]
fn registry_refuses_links_on_protected_owner() {
    let mut registry = DesignRegistry::new();
    let a = registry.create("A");
    let b = registry.create("B");
    registry.set_write_protection(a, true).unwrap();
    let err = registry.add_link(a, b, LinkPosition::Before, RestrictionScope::ALL).unwrap_err();
    assert!(matches!(err, Error::WriteProtected(_)));
}

#[test]
fn list_is_sorted_and_find_ignores_case() {
    let mut registry = DesignRegistry::new();
    registry.create("zeta");
    let alpha = registry.create("Alpha");
    registry.create("beta");
    let names: Vec<&str> = registry.list().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    assert_eq!(registry.find_by_name("ALPHA").map(|d| d.id()), Some(alpha));
    assert!(registry.find_by_name("gamma").is_none());
}

#[test]
fn merge_plan_marks_owner() {
    let mut registry = DesignRegistry::new();
    let owner = registry.create("Owner");
    let base = registry.create("Base");
    registry.add_link(owner, base, LinkPosition::Before, RestrictionScope::EQUIPMENT).unwrap();
    let plan = registry.merge_plan(owner).unwrap();
    assert_eq!(plan.layers().len(), 2);
    assert_eq!(plan.owner().design, Some(owner));
    assert_eq!(plan.layers()[0].scope, RestrictionScope::EQUIPMENT);
}

#[test]
fn clone_copies_content_and_links() {
    let mut registry = DesignRegistry::new();
    let source = registry.create("Source");
    let linked = registry.create("Linked");
    registry.change_field(source, head_field(), FieldValue::Item(ItemId(5))).unwrap();
    registry.add_link(source, linked, LinkPosition::After, RestrictionScope::ALL).unwrap();

    let copy = registry.clone_design(source, "Copy").unwrap();
    assert_ne!(copy, source);
    let document = registry.get(copy).unwrap();
    assert_eq!(document.name(), "Copy");
    assert_eq!(document.record().item(EquipSlot::Head), ItemId(5));
    assert_eq!(registry.links(copy, LinkPosition::After).len(), 1);
}

#[test]
fn clone_starts_without_undo_history() {
    let mut registry = DesignRegistry::new();
    let source = registry.create("Source");
    registry.change_field(source, head_field(), FieldValue::Item(ItemId(5))).unwrap();
    assert!(registry.get(source).unwrap().can_undo());

    let copy = registry.clone_design(source, "Copy").unwrap();
    assert!(!registry.get(copy).unwrap().can_undo());
    assert!(!registry.undo(copy).unwrap());
    assert_eq!(registry.get(copy).unwrap().record().item(EquipSlot::Head), ItemId(5));
    assert!(registry.undo(source).unwrap());
}

#[test]
fn design_file_json_and_msgpack() {
    let mut registry = DesignRegistry::new();
    let id = registry.create("Stored");
    let target = registry.create("Target");
    let skin = FieldId::Parameter(crate::types::ParameterFlag::SkinDiffuse);
    registry.change_field(id, skin, FieldValue::Parameter(ParamValue([0.1, 0.2, 0.3]))).unwrap();
    registry.change_apply(id, head_field(), true).unwrap();
    registry.add_tag(id, "work").unwrap();
    let body = MaterialKey::new(EquipSlot::Body, 0, 2);
    registry.change_material(id, body, Some(ColorRow::default())).unwrap();
    registry.add_link(id, target, LinkPosition::Before, RestrictionScope::CUSTOMIZATION).unwrap();
    let file = registry.export(id).unwrap();

    let json = to_json(&file).unwrap();
    assert_eq!(from_json(&json).unwrap(), file);
    let packed = to_msgpack(&file).unwrap();
    assert_eq!(from_msgpack(&packed).unwrap(), file);
}

#[test]
fn newer_design_file_is_rejected() {
    let registry = {
        let mut registry = DesignRegistry::new();
        registry.create("Future");
        registry
    };
    let mut file = registry.export(registry.list()[0].id()).unwrap();
    file.version = crate::constants::DESIGN_FILE_VERSION + 1;
    let json = to_json(&file).unwrap();
    assert!(matches!(from_json(&json), Err(Error::UnsupportedVersion(_))));
}

#[test]
fn load_files_resolves_forward_links() {
    let mut source = DesignRegistry::new();
    let owner = source.create("Owner");
    let target = source.create("Target");
    source.add_link(owner, target, LinkPosition::After, RestrictionScope::ALL).unwrap();
    let files = vec![source.export(owner).unwrap(), source.export(target).unwrap()];

    let mut registry = DesignRegistry::new();
    let loaded = registry.load_files(files);
    assert_eq!(loaded, vec![owner, target]);
    assert_eq!(registry.links(owner, LinkPosition::After)[0].target, target);
}

#[test]
fn import_collision_gets_fresh_id() {
    let mut registry = DesignRegistry::new();
    let id = registry.create("Original");
    let file = registry.export(id).unwrap();
    let imported = registry.import(file).unwrap();
    assert_ne!(imported, id);
    assert_eq!(registry.len(), 2);
}
