// src/params.rs
//! Named material parameters and texture path helpers.
//!
//! Editors and scripts address a few resource constants by name instead of
//! by slot. These helpers map those names onto [`ShaderResources`].

use glam::{Vec3, Vec4};

use crate::render::{InputShaderResources, ResourceTexture, ShaderResources, TextureType};
use crate::texture_slots::TextureSlot;

/// Upper bound for emissive intensity converted from the legacy glow value.
pub const EMISSIVE_INTENSITY_SOFT_MAX: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloatParam {
    AlphaRef,
    Strength(TextureSlot),
}

fn float_param(name: &str) -> Option<FloatParam> {
    let p = match name.to_ascii_lowercase().as_str() {
        "alpha" => FloatParam::AlphaRef,
        "emissive_intensity" => FloatParam::Strength(TextureSlot::Emittance),
        "shininess" => FloatParam::Strength(TextureSlot::Smoothness),
        "opacity" => FloatParam::Strength(TextureSlot::Opacity),
        _ => return None,
    };
    Some(p)
}

fn color_param(name: &str) -> Option<TextureSlot> {
    match name.to_ascii_lowercase().as_str() {
        "diffuse" => Some(TextureSlot::Diffuse),
        "specular" => Some(TextureSlot::Specular),
        "emissive_color" => Some(TextureSlot::Emittance),
        _ => None,
    }
}

/// Returns false when `name` is not a known float parameter.
pub fn set_param_float(res: &dyn ShaderResources, name: &str, value: f32) -> bool {
    match float_param(name) {
        Some(FloatParam::AlphaRef) => res.set_alpha_ref(value),
        Some(FloatParam::Strength(slot)) => res.set_strength(slot, value),
        None => return false,
    }
    true
}

pub fn param_float(res: &dyn ShaderResources, name: &str) -> Option<f32> {
    match float_param(name)? {
        FloatParam::AlphaRef => Some(res.alpha_ref()),
        FloatParam::Strength(slot) => Some(res.strength(slot)),
    }
}

/// Colours are stored with alpha 1.
pub fn set_param_vec3(res: &dyn ShaderResources, name: &str, value: Vec3) -> bool {
    let Some(slot) = color_param(name) else {
        return false;
    };
    res.set_color(slot, value.extend(1.0));
    true
}

pub fn param_vec3(res: &dyn ShaderResources, name: &str) -> Option<Vec3> {
    color_param(name).map(|slot| res.color(slot).truncate())
}

/// Strip a leading `engine/` (or `engine\`) and any leading slashes.
pub fn normalize_texture_path(file: &str) -> &str {
    let mut path = file;
    if path.len() > 7 {
        let head = &path.as_bytes()[..7];
        if head[..6].eq_ignore_ascii_case(b"engine") && (head[6] == b'/' || head[6] == b'\\') {
            path = &path[7..];
        }
    }
    path.trim_start_matches(['/', '\\'])
}

/// Convert an old glow amount into emissive intensity, reusing the diffuse
/// map as the emittance map. Returns whether anything was converted.
pub fn migrate_legacy_glow(material_name: &str, glow_amount: f32, input: &mut InputShaderResources) -> bool {
    if glow_amount <= 0.0 {
        return false;
    }

    let diffuse = input
        .textures
        .get(&TextureSlot::Diffuse)
        .filter(|t| t.texture_type == TextureType::Tex2D)
        .map(|t| t.name.clone());
    if let Some(name) = diffuse {
        input
            .textures
            .insert(TextureSlot::Emittance, ResourceTexture::new(name, TextureType::Tex2D));
    }

    let intensity = ((glow_amount * 2.0).powi(2) * 10.0).min(EMISSIVE_INTENSITY_SOFT_MAX);
    input.emittance = Vec4::new(input.emittance.x, input.emittance.y, input.emittance.z, intensity);
    log::warn!(
        "material '{}': legacy glow amount {} converted to emissive intensity {}, review its emittance parameters",
        material_name,
        glow_amount,
        intensity
    );
    true
}
