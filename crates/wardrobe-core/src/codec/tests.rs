use super::*;
use super::migrate::{migrate_v1_to_v2, migrate_v2_to_v3};
use base64::{engine::general_purpose::STANDARD, Engine};
use proptest::prelude::*;
use crate::constants::{CUSTOMIZE_COUNT, EQUIP_SLOT_COUNT, WIRE_V1_LEN, WIRE_V2_LEN, WIRE_V3_LEN};
use crate::types::{
    AppearanceRecord, ApplyMask, CrestSlot, CustomizeIndex, EquipSlot, Error, FieldCategory,
    FieldId, ItemId, MetaIndex, ParamValue, ParameterFlag, StainIds,
};

fn sample_record() -> AppearanceRecord {
    let mut record = AppearanceRecord::default();
    record.set_item(EquipSlot::Head, ItemId(0x1_0000_0001));
    record.set_stain(EquipSlot::Head, StainIds([3, 9]));
    record.set_customize(CustomizeIndex::Race, 2);
    record.set_crest(CrestSlot::Body, true);
    record.set_meta(MetaIndex::Wetness, true);
    record.set_parameter(ParameterFlag::SkinDiffuse, ParamValue([0.25, 0.5, 0.75]));
    record
}

fn sample_v1() -> PayloadV1 {
    let mut customize = [0u8; CUSTOMIZE_COUNT];
    customize[CustomizeIndex::Hairstyle.index()] = 5;
    let mut items = [0u32; EQUIP_SLOT_COUNT];
    items[EquipSlot::Body.index()] = 4242;
    let mut stains = [0u8; EQUIP_SLOT_COUNT];
    stains[EquipSlot::Body.index()] = 17;
    PayloadV1 {
        customize,
        customize_apply: 1 << CustomizeIndex::Hairstyle.index(),
        items,
        stains,
        equip_apply: 1 << EquipSlot::Body.index(),
        meta: [false, true, true],
        meta_apply: [true, false, false],
        write_protected: true,
    }
}

fn record_strategy() -> impl Strategy<Value = AppearanceRecord> {
    (
        prop::array::uniform12(any::<u64>()),
        prop::array::uniform12(any::<[u8; 2]>()),
        prop::collection::vec(any::<u8>(), CUSTOMIZE_COUNT),
        any::<[bool; 4]>(),
        any::<[bool; 3]>(),
        prop::array::uniform12(prop::array::uniform3(-10.0f32..10.0)),
    )
        .prop_map(|(items, stains, customize, meta, crests, params)| {
            let mut record = AppearanceRecord::default();
            for (i, slot) in EquipSlot::ALL.into_iter().enumerate() {
                record.set_item(slot, ItemId(items[i]));
                record.set_stain(slot, StainIds(stains[i]));
            }
            for (i, index) in CustomizeIndex::ALL.into_iter().enumerate() {
                record.set_customize(index, customize[i]);
            }
            for (i, index) in MetaIndex::ALL.into_iter().enumerate() {
                record.set_meta(index, meta[i]);
            }
            for (i, slot) in CrestSlot::ALL.into_iter().enumerate() {
                record.set_crest(slot, crests[i]);
            }
            for (i, flag) in ParameterFlag::ALL.into_iter().enumerate() {
                record.set_parameter(flag, ParamValue(params[i]));
            }
            record
        })
}

proptest! {
    #[test]
    fn encode_decode_round_trip(record in record_strategy(), bits in any::<u128>()) {
        let codec = WireCodec::default();
        let mask = ApplyMask::from_bits_truncate(bits);
        let decoded = codec.decode(&codec.encode(&record, mask).unwrap()).unwrap();
        prop_assert_eq!(decoded.record, record);
        prop_assert_eq!(decoded.mask, mask);
        prop_assert_eq!(decoded.version, 3);
        prop_assert_eq!(decoded.legacy_write_protected, None);
    }
}

#[test]
fn packed_lengths_match_layouts() {
    assert_eq!(sample_v1().pack().len(), WIRE_V1_LEN);
    assert_eq!(migrate_v1_to_v2(sample_v1()).pack().len(), WIRE_V2_LEN);
    assert_eq!(PayloadV3::from_design(&sample_record(), ApplyMask::ALL).pack().len(), WIRE_V3_LEN);
}

#[test]
fn v1_to_v2_splits_stain_apply_and_adds_wetness() {
    let v2 = migrate_v1_to_v2(sample_v1());
    assert_eq!(v2.items[EquipSlot::Body.index()], 4242);
    assert_eq!(v2.stain_apply, v2.equip_apply);
    assert_eq!(v2.meta, [false, true, true, false]);
    assert_eq!(v2.meta_apply, [true, false, false, false]);
    assert!(v2.write_protected);
}

#[test]
fn v2_to_v3_defaults_new_fields() {
    let (v3, write_protected) = migrate_v2_to_v3(migrate_v1_to_v2(sample_v1()));
    assert!(write_protected);
    assert_eq!(v3.stains[EquipSlot::Body.index()], [17, 0]);
    assert_eq!(v3.crest_apply, [false; 3]);
    assert_eq!(v3.parameter_apply, 0);

    let (record, mask) = v3.into_design();
    assert_eq!(record.parameter(ParameterFlag::SkinDiffuse), ParamValue::ZERO);
    assert!(!mask.is_set(FieldId::Crest(CrestSlot::Head)));
    assert!(!mask.is_set(FieldId::Meta(MetaIndex::Wetness)));
}

#[test]
fn hand_built_v2_blob_decodes() {
    let codec = WireCodec::default();
    let v2 = migrate_v1_to_v2(sample_v1());
    let blob = codec.encode_payload(2, &v2.pack()).unwrap();

    let decoded = codec.decode(&blob).unwrap();
    assert_eq!(decoded.version, 2);
    assert_eq!(decoded.legacy_write_protected, Some(true));
    assert_eq!(decoded.record.item(EquipSlot::Body), ItemId(4242));
    assert_eq!(decoded.record.stain(EquipSlot::Body), StainIds([17, 0]));
    assert_eq!(decoded.record.customize(CustomizeIndex::Hairstyle), 5);
    assert!(decoded.mask.is_set(FieldId::Stain(EquipSlot::Body)));
    assert!(!decoded.mask.is_set(FieldId::Stain(EquipSlot::Head)));
    assert!(decoded.mask.categories().intersection(FieldCategory::Parameter.into()).is_empty());
}

#[test]
fn hand_built_v1_blob_decodes() {
    let codec = WireCodec::default();
    let blob = codec.encode_payload(1, &sample_v1().pack()).unwrap();
    let decoded = codec.decode(&blob).unwrap();
    assert_eq!(decoded.version, 1);
    assert_eq!(decoded.legacy_write_protected, Some(true));
    assert!(decoded.record.meta(MetaIndex::VisorState));
    assert!(decoded.mask.is_set(FieldId::Meta(MetaIndex::HatState)));
    assert!(decoded.mask.is_set(FieldId::Equipment(EquipSlot::Body)));
}

#[test]
fn reencoding_a_migrated_blob_is_stable() {
    let codec = WireCodec::default();
    let first = codec.decode(&codec.encode_payload(1, &sample_v1().pack()).unwrap()).unwrap();
    let second = codec.decode(&codec.encode(&first.record, first.mask).unwrap()).unwrap();
    assert_eq!(second.record, first.record);
    assert_eq!(second.mask, first.mask);
    assert_eq!(second.version, 3);
}

#[test]
fn unknown_versions_are_rejected() {
    let codec = WireCodec::default();
    for version in [0u8, 4, 200] {
        let blob = codec.encode_payload(version, &[0u8; WIRE_V3_LEN]).unwrap();
        assert!(matches!(codec.decode(&blob), Err(Error::UnsupportedVersion(v)) if v == version));
    }
}

#[test]
fn short_payload_is_truncated() {
    let codec = WireCodec::default();
    let blob = codec.encode_payload(3, &[0u8; 40]).unwrap();
    match codec.decode(&blob) {
        Err(Error::Truncated { version, expected, actual }) => {
            assert_eq!(version, 3);
            assert_eq!(expected, WIRE_V3_LEN);
            assert_eq!(actual, 40);
        }
        other => panic!("expected truncation, got {:?}", other),
    }
}

#[test]
fn empty_input_is_truncated() {
    assert!(matches!(WireCodec::default().decode("  "), Err(Error::Truncated { .. })));
}

#[test]
fn malformed_input_is_invalid_state() {
    let codec = WireCodec::default();
    assert!(matches!(codec.decode("not base64!!"), Err(Error::InvalidState(_))));
}

#[test]
fn version_byte_without_payload_is_truncated() {
    let codec = WireCodec::default();
    for (version, expected_len) in [(1u8, WIRE_V1_LEN), (3, WIRE_V3_LEN)] {
        match codec.decode(&STANDARD.encode([version])) {
            Err(Error::Truncated { version: v, expected, actual }) => {
                assert_eq!(v, version);
                assert_eq!(expected, expected_len);
                assert_eq!(actual, 0);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }
}

#[test]
fn stream_cut_mid_way_is_truncated() {
    let codec = WireCodec::default();
    let blob = codec.encode(&sample_record(), ApplyMask::ALL).unwrap();
    let bytes = STANDARD.decode(blob).unwrap();
    let cut = STANDARD.encode(&bytes[..bytes.len() / 2]);
    match codec.decode(&cut) {
        Err(Error::Truncated { version, expected, actual }) => {
            assert_eq!(version, 3);
            assert_eq!(expected, WIRE_V3_LEN);
            assert!(actual < WIRE_V3_LEN);
        }
        other => panic!("expected truncation, got {:?}", other),
    }
}

#[test]
fn oversized_payload_is_rejected() {
    let codec = WireCodec::new(5, 22, 128);
    let blob = codec.encode_payload(3, &[0u8; 4096]).unwrap();
    assert!(matches!(codec.decode(&blob), Err(Error::InvalidState(_))));
}
