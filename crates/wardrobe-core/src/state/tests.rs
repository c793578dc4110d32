use super::*;
use std::sync::Arc;
use proptest::prelude::*;
use crate::design::material::{ColorRow, MaterialKey};
use crate::events::StateEvent;
use crate::host::{ItemInfo, ItemSlotKind, StaticHost};
use crate::types::{
    AppearanceRecord, ApplyMask, CategorySet, CustomizeIndex, EntityId, EquipSlot, Error,
    FieldCategory, FieldId, FieldValue, ItemId, ParamValue, RestrictionScope, StainIds,
};

const ITEM_A: ItemId = ItemId(1001);
const ITEM_B: ItemId = ItemId(2002);

fn natural() -> AppearanceRecord {
    let mut record = AppearanceRecord::default();
    record.set_item(EquipSlot::Head, ITEM_A);
    record.set_customize(CustomizeIndex::Hairstyle, 4);
    record
}

fn head_design() -> MergePlan {
    let mut record = AppearanceRecord::default();
    record.set_item(EquipSlot::Head, ITEM_B);
    let mask = ApplyMask::NONE.with(FieldId::Equipment(EquipSlot::Head));
    MergePlan::single(DesignLayer::from_record(record, mask))
}

fn manager() -> (StateManager<StaticHost>, EntityId) {
    let host = StaticHost::new();
    let entity = EntityId::new("player");
    host.insert_entity(entity.clone(), natural());
    let head = ItemSlotKind::Slot(EquipSlot::Head);
    host.insert_item(ItemInfo { id: ITEM_A, name: "Cap".into(), slot: head });
    host.insert_item(ItemInfo { id: ITEM_B, name: "Hood".into(), slot: head });
    host.insert_item(ItemInfo { id: ItemId(3003), name: "Band".into(), slot: ItemSlotKind::Ring });
    (StateManager::new(Arc::new(host), MergeEngine::default(), true), entity)
}

fn drain(rx: &flume::Receiver<StateEvent>) -> Vec<StateEvent> {
    rx.try_iter().collect()
}

proptest! {
    #[test]
    fn lock_is_exclusive(k1 in 1u32.., k2 in 1u32..) {
        prop_assume!(k1 != k2);
        let mut lock = EntityLock::new();
        prop_assert!(lock.lock(k1));
        prop_assert!(!lock.lock(k2));
        prop_assert!(lock.can_unlock(k1));
        prop_assert!(lock.can_unlock(0));
        prop_assert!(!lock.can_unlock(k2));
        prop_assert!(!lock.unlock(k2));
        prop_assert_eq!(lock.key(), k1);
        prop_assert!(lock.unlock(k1));
        prop_assert!(!lock.is_locked());
    }
}

#[test]
fn master_key_never_locks() {
    let mut lock = EntityLock::new();
    assert!(!lock.lock(0));
    assert!(lock.lock(5));
    assert!(lock.lock(5));
    assert!(lock.unlock(0));
    assert_eq!(lock.key(), 0);
}

#[test]
fn customization_scope_on_equipment_design_does_nothing() {
    let (manager, entity) = manager();
    let rx = manager.engine().subscribe();
    let settings = ApplySettings::default().with_scope(RestrictionScope::CUSTOMIZATION);

    let outcome = manager.apply(&entity, &head_design(), &settings).unwrap();
    assert_eq!(outcome, ApplyOutcome::NothingDone);
    assert!(drain(&rx).is_empty());
}

#[test]
fn full_scope_writes_head_with_caller_source() {
    let (manager, entity) = manager();
    let rx = manager.engine().subscribe();
    let settings = ApplySettings { is_final: false, ..ApplySettings::ipc(0) };

    let outcome = manager.apply(&entity, &head_design(), &settings).unwrap();
    assert_eq!(outcome, ApplyOutcome::Success(CategorySet::EQUIPMENT));

    let snapshot = manager.snapshot(&entity, 0).unwrap();
    assert_eq!(snapshot.current.item(EquipSlot::Head), ITEM_B);
    assert_eq!(snapshot.sources, vec![(FieldId::Equipment(EquipSlot::Head), StateSource::Ipc)]);

    let events = drain(&rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].categories, CategorySet::EQUIPMENT);
    assert_eq!(events[0].source, StateSource::Ipc);
    assert!(!events[0].finalized);
}

#[test]
fn final_apply_publishes_finalized_follow_up() {
    let (manager, entity) = manager();
    let rx = manager.engine().subscribe();
    manager.apply(&entity, &head_design(), &ApplySettings::default()).unwrap();
    let events = drain(&rx);
    assert_eq!(events.len(), 2);
    assert!(!events[0].finalized);
    assert!(events[1].finalized);
}

#[test]
fn foreign_key_is_refused_without_effect() {
    let (manager, entity) = manager();
    assert!(manager.lock(&entity, 42).unwrap());
    let rx = manager.engine().subscribe();

    let err = manager.apply(&entity, &head_design(), &ApplySettings::ipc(77)).unwrap_err();
    assert!(matches!(err, Error::Locked { .. }));
    assert_eq!(manager.snapshot(&entity, 42).unwrap().current.item(EquipSlot::Head), ITEM_A);
    assert!(drain(&rx).is_empty());
}

#[test]
fn unknown_entity_is_not_found() {
    let (manager, _) = manager();
    let ghost = EntityId::new("ghost");
    let err = manager.apply(&ghost, &head_design(), &ApplySettings::default()).unwrap_err();
    assert!(matches!(err, Error::ActorNotFound(_)));
    assert!(manager.is_empty());
}

#[test]
fn merge_links_false_uses_owner_only() {
    let (manager, entity) = manager();
    let mut linked = AppearanceRecord::default();
    linked.set_customize(CustomizeIndex::Hairstyle, 9);
    let mask = ApplyMask::for_category(FieldCategory::Customize);
    let linked = DesignLayer::from_record(linked, mask);
    let owner = head_design().owner().clone();
    let plan = MergePlan::new(vec![linked, owner], 1).unwrap();

    let settings = ApplySettings { merge_links: false, ..ApplySettings::default() };
    manager.apply(&entity, &plan, &settings).unwrap();
    let current = manager.snapshot(&entity, 0).unwrap().current;
    assert_eq!(current.customize(CustomizeIndex::Hairstyle), 4);
    assert_eq!(current.item(EquipSlot::Head), ITEM_B);
}

#[test]
fn layer_scope_narrows_call_scope() {
    let (manager, entity) = manager();
    let mut layer = head_design().owner().clone();
    layer.scope = RestrictionScope::CUSTOMIZATION;
    let plan = MergePlan::single(layer);
    let outcome = manager.apply(&entity, &plan, &ApplySettings::default()).unwrap();
    assert_eq!(outcome, ApplyOutcome::NothingDone);
}

#[test]
fn equipment_change_drops_slot_materials() {
    let (manager, entity) = manager();
    let key = MaterialKey::new(EquipSlot::Head, 0, 3);
    let row = ColorRow { diffuse: ParamValue::scalar(0.5), ..ColorRow::default() };

    let mut layer = DesignLayer::from_record(natural(), ApplyMask::NONE);
    layer.materials.set(key, Some(row));
    manager.apply(&entity, &MergePlan::single(layer), &ApplySettings::default()).unwrap();
    assert_eq!(manager.snapshot(&entity, 0).unwrap().materials.len(), 1);

    let outcome = manager.apply(&entity, &head_design(), &ApplySettings::default()).unwrap();
    assert_eq!(outcome, ApplyOutcome::Success(CategorySet::EQUIPMENT | CategorySet::MATERIAL));
    assert!(manager.snapshot(&entity, 0).unwrap().materials.is_empty());
}

#[test]
fn chain_that_ends_on_the_current_value_changes_nothing() {
    let (manager, entity) = manager();
    let key = MaterialKey::new(EquipSlot::Head, 0, 1);
    let mut seed = DesignLayer::from_record(natural(), ApplyMask::NONE);
    seed.materials.set(key, Some(ColorRow::default()));
    manager.apply(&entity, &MergePlan::single(seed), &ApplySettings::default()).unwrap();
    let rx = manager.engine().subscribe();

    let before = head_design().owner().clone();
    let mut owner = before.clone();
    owner.record.set_item(EquipSlot::Head, ITEM_A);
    let plan = MergePlan::new(vec![before, owner], 1).unwrap();

    let outcome = manager.apply(&entity, &plan, &ApplySettings::ipc(0)).unwrap();
    assert_eq!(outcome, ApplyOutcome::NothingDone);
    let snapshot = manager.snapshot(&entity, 0).unwrap();
    assert_eq!(snapshot.current.item(EquipSlot::Head), ITEM_A);
    assert!(snapshot.sources.is_empty());
    assert_eq!(snapshot.materials.len(), 1);
    assert!(drain(&rx).is_empty());
}

#[test]
fn reapplying_an_equal_material_keeps_its_source() {
    let (manager, entity) = manager();
    let key = MaterialKey::new(EquipSlot::Body, 2, 0);
    let mut layer = DesignLayer::from_record(natural(), ApplyMask::NONE);
    layer.materials.set(key, Some(ColorRow::default()));
    let plan = MergePlan::single(layer);
    manager.apply(&entity, &plan, &ApplySettings::default()).unwrap();

    let outcome = manager.apply(&entity, &plan, &ApplySettings::ipc(0)).unwrap();
    assert_eq!(outcome, ApplyOutcome::NothingDone);
    let materials = manager.snapshot(&entity, 0).unwrap().materials;
    assert_eq!(materials[0].1.source, StateSource::Manual);
}

#[test]
fn equipment_change_keeps_materials_without_reset_dependents() {
    let (manager, entity) = manager();
    let key = MaterialKey::new(EquipSlot::Head, 1, 0);
    let mut layer = DesignLayer::from_record(natural(), ApplyMask::NONE);
    layer.materials.set(key, Some(ColorRow::default()));
    manager.apply(&entity, &MergePlan::single(layer), &ApplySettings::default()).unwrap();

    let settings = ApplySettings { reset_dependents: false, ..ApplySettings::default() };
    manager.apply(&entity, &head_design(), &settings).unwrap();
    assert_eq!(manager.snapshot(&entity, 0).unwrap().materials.len(), 1);
}

#[test]
fn reset_equip_restores_natural_items_only() {
    let (manager, entity) = manager();
    manager.apply(&entity, &head_design(), &ApplySettings::default()).unwrap();
    let hairstyle = FieldId::Customize(CustomizeIndex::Hairstyle);
    manager
        .change_field(&entity, hairstyle, FieldValue::Customize(7), StateSource::Manual, 0)
        .unwrap();

    let outcome = manager.reset_equip(&entity, 0).unwrap();
    assert_eq!(outcome, ApplyOutcome::Success(CategorySet::EQUIPMENT));
    let snapshot = manager.snapshot(&entity, 0).unwrap();
    assert_eq!(snapshot.current.item(EquipSlot::Head), ITEM_A);
    assert_eq!(snapshot.current.customize(CustomizeIndex::Hairstyle), 7);
    assert_eq!(snapshot.sources, vec![(hairstyle, StateSource::Manual)]);

    manager.reset_state(&entity, 0).unwrap();
    let snapshot = manager.snapshot(&entity, 0).unwrap();
    assert_eq!(snapshot.current, natural());
    assert!(snapshot.sources.is_empty());
}

#[test]
fn reset_respects_lock() {
    let (manager, entity) = manager();
    manager.lock(&entity, 42).unwrap();
    assert!(matches!(manager.reset_customize(&entity, 1), Err(Error::Locked { .. })));
}

#[test]
fn external_change_follows_game_owned_fields() {
    let (manager, entity) = manager();
    manager.apply(&entity, &head_design(), &ApplySettings::default()).unwrap();
    let rx = manager.engine().subscribe();

    let mut next = natural();
    next.set_item(EquipSlot::Head, ItemId(5));
    next.set_item(EquipSlot::Body, ItemId(6));
    let changed = manager.observe_external_change(&entity, next);
    assert_eq!(changed, CategorySet::EQUIPMENT);

    let snapshot = manager.snapshot(&entity, 0).unwrap();
    assert_eq!(snapshot.base, next);
    assert_eq!(snapshot.current.item(EquipSlot::Head), ITEM_B);
    assert_eq!(snapshot.current.item(EquipSlot::Body), ItemId(6));

    let events = drain(&rx);
    assert!(events.iter().all(|e| e.source == StateSource::Game));
}

#[test]
fn evict_retains_customized_entities() {
    let (manager, entity) = manager();
    manager.apply(&entity, &head_design(), &ApplySettings::default()).unwrap();
    assert!(manager.evict(&entity));
    assert!(!manager.is_tracked(&entity));
    assert_eq!(manager.retained_len(), 1);

    let snapshot = manager.snapshot(&entity, 0).unwrap();
    assert_eq!(snapshot.current.item(EquipSlot::Head), ITEM_B);
    assert_eq!(manager.retained_len(), 0);
}

#[test]
fn evict_drops_untouched_entities() {
    let (manager, entity) = manager();
    manager.snapshot(&entity, 0).unwrap();
    assert!(!manager.evict(&entity));
    assert_eq!(manager.retained_len(), 0);
}

#[test]
fn evict_retains_locked_entities() {
    let (manager, entity) = manager();
    manager.lock(&entity, 9).unwrap();
    assert!(manager.evict(&entity));
    assert_eq!(manager.unlock_all(9), 1);
}

#[test]
fn handle_taken_before_eviction_sees_the_slot_emptied() {
    let (manager, entity) = manager();
    let stale = manager.entry(&entity).unwrap();
    manager.lock(&entity, 42).unwrap();
    assert!(manager.evict(&entity));

    assert!(stale.lock().is_none());
    assert!(!manager.lock(&entity, 77).unwrap());
    assert!(manager.snapshot(&entity, 42).unwrap().locked);
}

#[test]
fn concurrent_reattach_keeps_the_retained_lock() {
    let (manager, entity) = manager();
    for _ in 0..20 {
        manager.lock(&entity, 42).unwrap();
        assert!(manager.evict(&entity));

        let stolen = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| manager.lock(&entity, 77).unwrap()))
                .collect();
            handles.into_iter().filter_map(|h| h.join().ok()).any(|locked| locked)
        });
        assert!(!stolen);
        assert_eq!(manager.retained_len(), 0);
    }
}

#[test]
fn change_item_validates_catalogue() {
    let (manager, entity) = manager();
    let manual = StateSource::Manual;
    let unknown = manager.change_item(&entity, EquipSlot::Head, ItemId(77), None, manual, 0);
    assert!(matches!(unknown, Err(Error::ItemInvalid(77))));

    let wrong_slot = manager.change_item(&entity, EquipSlot::Body, ITEM_B, None, manual, 0);
    assert!(matches!(wrong_slot, Err(Error::CategoryMismatch { .. })));

    let stains = Some(StainIds::single(2));
    let ring = manager.change_item(&entity, EquipSlot::LFinger, ItemId(3003), stains, manual, 0);
    assert_eq!(ring.unwrap(), ApplyOutcome::Success(CategorySet::EQUIPMENT | CategorySet::STAIN));
}

#[test]
fn change_field_rejects_wrong_value_type() {
    let (manager, entity) = manager();
    let head = FieldId::Equipment(EquipSlot::Head);
    let err = manager
        .change_field(&entity, head, FieldValue::Flag(true), StateSource::Manual, 0)
        .unwrap_err();
    assert!(matches!(err, Error::CategoryMismatch { .. }));
}

#[test]
fn unlock_all_only_releases_matching_keys() {
    let (manager, entity) = manager();
    manager.host().insert_entity(EntityId::new("other"), natural());
    manager.lock(&entity, 1).unwrap();
    manager.lock(&EntityId::new("other"), 2).unwrap();
    assert_eq!(manager.unlock_all(1), 1);
    assert!(!manager.lock(&EntityId::new("other"), 1).unwrap());
    assert_eq!(manager.unlock_all(0), 1);
}
