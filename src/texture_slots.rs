// src/texture_slots.rs
//! Texture slot semantics.
//!
//! A static table maps every semantic slot to its UI name, enum name, help
//! text, file-suffix convention and whether a strength slider applies.
//! Canonical rows are stored in slot order so indexed lookups are direct;
//! legacy aliases follow and only take part in name -> slot searches.

use crate::error::{Error, Result};

/// Semantic texture slot of a shader resource set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TextureSlot {
    Diffuse = 0,
    Normals,
    Specular,
    Env,
    DetailOverlay,
    SecondSmoothness,
    Height,
    DecalOverlay,
    SubSurface,
    Custom,
    CustomSecondary,
    Opacity,
    Smoothness,
    Emittance,
    Occlusion,
    Specular2,
}

impl TextureSlot {
    pub const COUNT: usize = 16;

    pub const ALL: [TextureSlot; Self::COUNT] = [
        TextureSlot::Diffuse,
        TextureSlot::Normals,
        TextureSlot::Specular,
        TextureSlot::Env,
        TextureSlot::DetailOverlay,
        TextureSlot::SecondSmoothness,
        TextureSlot::Height,
        TextureSlot::DecalOverlay,
        TextureSlot::SubSurface,
        TextureSlot::Custom,
        TextureSlot::CustomSecondary,
        TextureSlot::Opacity,
        TextureSlot::Smoothness,
        TextureSlot::Emittance,
        TextureSlot::Occlusion,
        TextureSlot::Specular2,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Checked conversion from a raw slot index.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| Error::out_of_range("texture slot", index, Self::COUNT))
    }

    /// Canonical UI name ("Diffuse", "Bumpmap", ...).
    #[inline]
    pub fn name(self) -> &'static str {
        canonical(self).name
    }
}

/// One row of the semantics table.
#[derive(Debug, Clone, Copy)]
pub struct SlotSemantics {
    pub slot: TextureSlot,
    pub enum_name: &'static str,
    pub adjustable: bool,
    pub name: &'static str,
    pub description: &'static str,
    pub suffix: &'static str,
}

const fn row(
    slot: TextureSlot,
    enum_name: &'static str,
    adjustable: bool,
    name: &'static str,
    description: &'static str,
    suffix: &'static str,
) -> SlotSemantics {
    SlotSemantics { slot, enum_name, adjustable, name, description, suffix }
}

// Canonical rows must stay in slot order; see `canonical_rows_are_indexed_by_slot`.
static SLOT_SEMANTICS: [SlotSemantics; TextureSlot::COUNT + 3] = [
    row(TextureSlot::Diffuse, "EFTT_DIFFUSE", true, "Diffuse",
        "Base surface color. Alpha mask is contained in alpha channel.", "_diff"),
    // "Normal" would be the better UI name, kept as "Bumpmap" for existing assets.
    row(TextureSlot::Normals, "EFTT_NORMALS", true, "Bumpmap",
        "Normal direction for each pixel simulating bumps on the surface. Smoothness map contained in alpha channel.", "_ddn"),
    row(TextureSlot::Specular, "EFTT_SPECULAR", true, "Specular",
        "Reflective and shininess intensity and color of reflective highlights", "_spec"),
    row(TextureSlot::Env, "EFTT_ENV", true, "Environment", "Deprecated", "_cm"),
    row(TextureSlot::DetailOverlay, "EFTT_DETAIL_OVERLAY", true, "Detail",
        "Increases micro and macro surface bump, diffuse and gloss detail. To use, enable the 'Detail Mapping' shader gen param. ", "_detail"),
    row(TextureSlot::SecondSmoothness, "EFTT_SECOND_SMOOTHNESS", false, "SecondSmoothness", "", ""),
    row(TextureSlot::Height, "EFTT_HEIGHT", true, "Heightmap",
        "Height for offset bump, POM, silhouette POM, and displacement mapping defined by a Grayscale texture", "_displ"),
    row(TextureSlot::DecalOverlay, "EFTT_DECAL_OVERLAY", true, "Decal", "", ""),
    row(TextureSlot::SubSurface, "EFTT_SUBSURFACE", true, "SubSurface", "", "_sss"),
    row(TextureSlot::Custom, "EFTT_CUSTOM", true, "Custom", "", ""),
    row(TextureSlot::CustomSecondary, "EFTT_CUSTOM_SECONDARY", true, "[1] Custom", "", ""),
    row(TextureSlot::Opacity, "EFTT_OPACITY", true, "Opacity",
        "SubSurfaceScattering map to simulate thin areas for light to penetrate", ""),
    row(TextureSlot::Smoothness, "EFTT_SMOOTHNESS", false, "Smoothness", "", "_ddna"),
    row(TextureSlot::Emittance, "EFTT_EMITTANCE", true, "Emittance",
        "Multiplies the emissive color with RGB texture. Emissive alpha mask is contained in alpha channel.", "_em"),
    row(TextureSlot::Occlusion, "EFTT_OCCLUSION", true, "Occlusion",
        "Grayscale texture to mask diffuse lighting response and simulate darker areas", ""),
    row(TextureSlot::Specular2, "EFTT_SPECULAR_2", true, "Specular2", "", "_spec"),
    // legacy names, resolve to the current slots
    row(TextureSlot::Normals, "EFTT_BUMP", false, "Normal", "", ""),
    row(TextureSlot::Smoothness, "EFTT_GLOSS_NORMAL_A", false, "GlossNormalA", "", ""),
    row(TextureSlot::Height, "EFTT_BUMPHEIGHT", false, "Height", "", ""),
];

#[inline]
fn canonical(slot: TextureSlot) -> &'static SlotSemantics {
    &SLOT_SEMANTICS[slot.index()]
}

/// Every row, canonical rows first.
pub fn semantics() -> &'static [SlotSemantics] {
    &SLOT_SEMANTICS
}

/// Case-insensitive match on UI name or enum name; first row wins.
pub fn slot_for_name(name: &str) -> Option<TextureSlot> {
    SLOT_SEMANTICS
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name) || r.enum_name.eq_ignore_ascii_case(name))
        .map(|r| r.slot)
}

/// Like [`slot_for_name`] but reports the miss as an error.
pub fn require_slot(name: &str) -> Result<TextureSlot> {
    slot_for_name(name).ok_or_else(|| Error::UnknownTextureSlot(name.to_string()))
}

/// Canonical name of `slot`. Never returns a legacy alias.
pub fn name_for_slot(slot: TextureSlot) -> Option<&'static str> {
    SLOT_SEMANTICS.iter().find(|r| r.slot == slot).map(|r| r.name)
}

#[inline]
pub fn enum_name_for_slot(slot: TextureSlot) -> &'static str {
    canonical(slot).enum_name
}

#[inline]
pub fn description_for_slot(slot: TextureSlot) -> &'static str {
    canonical(slot).description
}

#[inline]
pub fn suffix_for_slot(slot: TextureSlot) -> &'static str {
    canonical(slot).suffix
}

#[inline]
pub fn is_adjustable(slot: TextureSlot) -> bool {
    canonical(slot).adjustable
}

/// Raw-index lookup for callers holding an untyped slot number.
pub fn lookup_by_index(index: usize) -> Result<&'static SlotSemantics> {
    TextureSlot::from_index(index).map(canonical)
}

/// Slot whose file-suffix convention `stem` ends with. Longest suffix wins,
/// so "rock_ddna" is Smoothness rather than Normals; on equal length the
/// earlier slot wins.
pub fn slot_for_suffix(stem: &str) -> Option<TextureSlot> {
    let lower = stem.to_ascii_lowercase();
    SLOT_SEMANTICS[..TextureSlot::COUNT]
        .iter()
        .rev()
        .filter(|r| !r.suffix.is_empty() && lower.ends_with(r.suffix))
        .max_by_key(|r| r.suffix.len())
        .map(|r| r.slot)
}
