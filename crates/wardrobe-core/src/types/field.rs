//! Field catalogue
//!
//! Every addressable appearance attribute is named by a [`FieldId`]. FieldIds
//! have a dense index so apply masks, provenance maps and the wire layout can
//! all share one enumeration instead of per-category bitfields.

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::constants::{
    CREST_SLOT_COUNT, CUSTOMIZE_COUNT, EQUIP_SLOT_COUNT, FIELD_COUNT, META_COUNT, PARAMETER_COUNT,
};

/// Declares a fieldless catalogue enum with `ALL`, `index` and `from_index`.
macro_rules! catalogue_enum {
    (
        $(#[$meta:meta])* $name:ident,
        $count:expr,
        { $($(#[$vmeta:meta])* $variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in index order
            pub const ALL: [$name; $count] = [$($name::$variant),+];

            /// Dense index of this variant
            pub const fn index(self) -> usize {
                self as usize
            }

            /// Variant at a dense index
            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }
        }
    };
}

catalogue_enum!(
    /// Equipment slots, in the host's draw order
    EquipSlot, EQUIP_SLOT_COUNT, {
        /// Head piece
        Head,
        /// Body piece
        Body,
        /// Gloves
        Hands,
        /// Legs
        Legs,
        /// Feet
        Feet,
        /// Earrings
        Ears,
        /// Necklace
        Neck,
        /// Bracelets
        Wrists,
        /// Right ring
        RFinger,
        /// Left ring
        LFinger,
        /// Main hand weapon
        MainHand,
        /// Off hand weapon or shield
        OffHand,
    }
);

impl EquipSlot {
    /// Weapon slots carry weapon models instead of armor models
    pub const fn is_weapon(self) -> bool {
        matches!(self, EquipSlot::MainHand | EquipSlot::OffHand)
    }

    /// Accessory slots have no dye channels in the host
    pub const fn is_accessory(self) -> bool {
        matches!(
            self,
            EquipSlot::Ears
                | EquipSlot::Neck
                | EquipSlot::Wrists
                | EquipSlot::RFinger
                | EquipSlot::LFinger
        )
    }
}

catalogue_enum!(
    /// Slots that can display a crest
    CrestSlot, CREST_SLOT_COUNT, {
        /// Crest on the head piece
        Head,
        /// Crest on the body piece
        Body,
        /// Crest on the shield
        OffHand,
    }
);

impl CrestSlot {
    /// The equipment slot this crest belongs to
    pub const fn equip_slot(self) -> EquipSlot {
        match self {
            CrestSlot::Head => EquipSlot::Head,
            CrestSlot::Body => EquipSlot::Body,
            CrestSlot::OffHand => EquipSlot::OffHand,
        }
    }

    /// Crest slot for an equipment slot, if that slot can show one
    pub const fn from_equip_slot(slot: EquipSlot) -> Option<Self> {
        match slot {
            EquipSlot::Head => Some(CrestSlot::Head),
            EquipSlot::Body => Some(CrestSlot::Body),
            EquipSlot::OffHand => Some(CrestSlot::OffHand),
            _ => None,
        }
    }
}

catalogue_enum!(
    /// Byte offsets into the host's customize array
    CustomizeIndex, CUSTOMIZE_COUNT, {
        /// Race
        Race,
        /// Gender
        Gender,
        /// Body type (adult, elder, child)
        BodyType,
        /// Height percentage
        Height,
        /// Clan (sub-race)
        Clan,
        /// Face preset
        Face,
        /// Hairstyle
        Hairstyle,
        /// Highlights toggle
        Highlights,
        /// Skin color
        SkinColor,
        /// Right eye color
        EyeColorRight,
        /// Hair color
        HairColor,
        /// Highlights color
        HighlightsColor,
        /// Facial feature bit field, including the legacy tattoo bit
        FacialFeatures,
        /// Tattoo color
        TattooColor,
        /// Eyebrows
        Eyebrows,
        /// Left eye color
        EyeColorLeft,
        /// Eye shape, high bit is the small iris flag
        EyeShape,
        /// Nose
        Nose,
        /// Jaw
        Jaw,
        /// Mouth, high bit is the lipstick flag
        Mouth,
        /// Lip color
        LipColor,
        /// Muscle mass or ear length depending on race
        MuscleMass,
        /// Tail shape or ear shape depending on race
        TailShape,
        /// Bust size
        BustSize,
        /// Face paint, high bit is the reversed flag
        FacePaint,
        /// Face paint color
        FacePaintColor,
    }
);

impl CustomizeIndex {
    /// Customizations that select a different base model.
    ///
    /// Changing one of these invalidates every other customization value, so
    /// the host re-validates the whole array afterwards.
    pub const fn is_model_defining(self) -> bool {
        matches!(
            self,
            CustomizeIndex::Race
                | CustomizeIndex::Gender
                | CustomizeIndex::BodyType
                | CustomizeIndex::Clan
        )
    }
}

catalogue_enum!(
    /// Visibility and state toggles that are not part of the customize array
    MetaIndex, META_COUNT, {
        /// Hat visible
        HatState,
        /// Visor toggled
        VisorState,
        /// Weapon drawn
        WeaponState,
        /// Forced wet look
        Wetness,
    }
);

catalogue_enum!(
    /// Continuous color and scalar customization parameters
    ParameterFlag, PARAMETER_COUNT, {
        /// Skin diffuse color
        SkinDiffuse,
        /// Skin specular color
        SkinSpecular,
        /// Muscle tone scalar
        MuscleTone,
        /// Lip diffuse color
        LipDiffuse,
        /// Hair diffuse color
        HairDiffuse,
        /// Hair specular color
        HairSpecular,
        /// Hair highlight color
        HairHighlight,
        /// Left eye color
        LeftEye,
        /// Right eye color
        RightEye,
        /// Feature (tattoo, ears) color
        FeatureColor,
        /// Face paint UV multiplier scalar
        FacePaintUvMultiplier,
        /// Decal color
        DecalColor,
    }
);

catalogue_enum!(
    /// Category of a field; restriction scopes and notifications work on these
    FieldCategory, 6, {
        /// Equipped items
        Equipment,
        /// Dyes on equipped items
        Stain,
        /// Crest visibility
        Crest,
        /// Customize array bytes
        Customize,
        /// Meta toggles
        Meta,
        /// Continuous parameters
        Parameter,
    }
);

impl FieldCategory {
    /// All fields in this category, in index order
    pub fn fields(self) -> impl Iterator<Item = FieldId> {
        let (start, len) = match self {
            FieldCategory::Equipment => (EQUIPMENT_OFFSET, EQUIP_SLOT_COUNT),
            FieldCategory::Stain => (STAIN_OFFSET, EQUIP_SLOT_COUNT),
            FieldCategory::Crest => (CREST_OFFSET, CREST_SLOT_COUNT),
            FieldCategory::Customize => (CUSTOMIZE_OFFSET, CUSTOMIZE_COUNT),
            FieldCategory::Meta => (META_OFFSET, META_COUNT),
            FieldCategory::Parameter => (PARAMETER_OFFSET, PARAMETER_COUNT),
        };
        (start..start + len).filter_map(FieldId::from_index)
    }
}

const EQUIPMENT_OFFSET: usize = 0;
const STAIN_OFFSET: usize = EQUIPMENT_OFFSET + EQUIP_SLOT_COUNT;
const CREST_OFFSET: usize = STAIN_OFFSET + EQUIP_SLOT_COUNT;
const CUSTOMIZE_OFFSET: usize = CREST_OFFSET + CREST_SLOT_COUNT;
const META_OFFSET: usize = CUSTOMIZE_OFFSET + CUSTOMIZE_COUNT;
const PARAMETER_OFFSET: usize = META_OFFSET + META_COUNT;

/// Stable identifier of one addressable appearance attribute.
///
/// The variant payload types make it impossible to name a field that does not
/// exist for its category (a crest on the legs, a seventh meta toggle, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldId {
    /// Item in an equipment slot
    Equipment(EquipSlot),
    /// Dyes in an equipment slot
    Stain(EquipSlot),
    /// Crest visibility
    Crest(CrestSlot),
    /// Customize array byte
    Customize(CustomizeIndex),
    /// Meta toggle
    Meta(MetaIndex),
    /// Continuous parameter
    Parameter(ParameterFlag),
}

impl FieldId {
    /// Number of distinct fields
    pub const COUNT: usize = FIELD_COUNT;

    /// Category this field belongs to
    pub const fn category(self) -> FieldCategory {
        match self {
            FieldId::Equipment(_) => FieldCategory::Equipment,
            FieldId::Stain(_) => FieldCategory::Stain,
            FieldId::Crest(_) => FieldCategory::Crest,
            FieldId::Customize(_) => FieldCategory::Customize,
            FieldId::Meta(_) => FieldCategory::Meta,
            FieldId::Parameter(_) => FieldCategory::Parameter,
        }
    }

    /// Dense index in `0..FieldId::COUNT`
    pub const fn index(self) -> usize {
        match self {
            FieldId::Equipment(slot) => EQUIPMENT_OFFSET + slot.index(),
            FieldId::Stain(slot) => STAIN_OFFSET + slot.index(),
            FieldId::Crest(slot) => CREST_OFFSET + slot.index(),
            FieldId::Customize(index) => CUSTOMIZE_OFFSET + index.index(),
            FieldId::Meta(index) => META_OFFSET + index.index(),
            FieldId::Parameter(flag) => PARAMETER_OFFSET + flag.index(),
        }
    }

    /// Field at a dense index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            i if i < STAIN_OFFSET => {
                EquipSlot::from_index(i - EQUIPMENT_OFFSET).map(FieldId::Equipment)
            }
            i if i < CREST_OFFSET => EquipSlot::from_index(i - STAIN_OFFSET).map(FieldId::Stain),
            i if i < CUSTOMIZE_OFFSET => {
                CrestSlot::from_index(i - CREST_OFFSET).map(FieldId::Crest)
            }
            i if i < META_OFFSET => {
                CustomizeIndex::from_index(i - CUSTOMIZE_OFFSET).map(FieldId::Customize)
            }
            i if i < PARAMETER_OFFSET => MetaIndex::from_index(i - META_OFFSET).map(FieldId::Meta),
            i => ParameterFlag::from_index(i - PARAMETER_OFFSET).map(FieldId::Parameter),
        }
    }

    /// Every field, in index order
    pub fn all() -> impl Iterator<Item = FieldId> {
        (0..FIELD_COUNT).filter_map(FieldId::from_index)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::Equipment(slot) => write!(f, "Equipment({:?})", slot),
            FieldId::Stain(slot) => write!(f, "Stain({:?})", slot),
            FieldId::Crest(slot) => write!(f, "Crest({:?})", slot),
            FieldId::Customize(index) => write!(f, "Customize({:?})", index),
            FieldId::Meta(index) => write!(f, "Meta({:?})", index),
            FieldId::Parameter(flag) => write!(f, "Parameter({:?})", flag),
        }
    }
}
