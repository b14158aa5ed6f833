// src/debug_view.rs
//! Policy tables for the sketch and texel-density debug views.
//!
//! Both views temporarily swap a material's shader for a debug shader and
//! remember the original in the material's pre-sketch slot. These functions
//! only decide what to swap; the material does the swapping.

use crate::render::ShaderType;

pub const SKETCH_OFF: i32 = 0;
pub const SKETCH_FULL: i32 = 1;
pub const SKETCH_FAST: i32 = 2;
pub const SKETCH_LOW_SPEC: i32 = 3;
pub const SKETCH_TEXELS_PER_METER: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SketchAction {
    /// Leave the material (and its sub-materials) alone.
    Keep,
    /// Back up the current shader, then install `shader` if given.
    Replace {
        shader: Option<&'static str>,
        /// Load through `load_shader_item` and take its technique too.
        via_item: bool,
    },
}

/// Types whose shaders stay in place in every debug view.
fn never_replaced(ty: ShaderType) -> bool {
    matches!(
        ty,
        ShaderType::Terrain
            | ShaderType::Shadow
            | ShaderType::Water
            | ShaderType::FX
            | ShaderType::PostProcess
            | ShaderType::HDR
            | ShaderType::Sky
            | ShaderType::Particle
    )
}

pub fn sketch_policy(ty: ShaderType, mode: i32) -> SketchAction {
    if never_replaced(ty) {
        return SketchAction::Keep;
    }
    if ty == ShaderType::Vegetation && mode == SKETCH_LOW_SPEC {
        return SketchAction::Keep;
    }
    sketch_replacement(mode)
}

/// Replacement for `mode` regardless of the current shader's type. Used
/// when the material is already showing a debug shader.
pub fn sketch_replacement(mode: i32) -> SketchAction {
    match mode {
        SKETCH_FULL => SketchAction::Replace {
            shader: Some("Sketch"),
            via_item: false,
        },
        SKETCH_FAST => SketchAction::Replace {
            shader: Some("Sketch.Fast"),
            via_item: false,
        },
        SKETCH_TEXELS_PER_METER => SketchAction::Replace {
            shader: Some("Sketch.TexelsPerMeter"),
            via_item: true,
        },
        _ => SketchAction::Replace {
            shader: None,
            via_item: false,
        },
    }
}

/// Effective texel-density mode for a material. 0 means restore.
pub fn texel_density_policy(ty: ShaderType, mode: i32, surface_type_id: i32) -> i32 {
    if ty == ShaderType::Terrain {
        if (mode == 3 || mode == 4) && surface_type_id != 0 {
            return mode;
        }
        return 0;
    }
    if never_replaced(ty) {
        return 0;
    }
    if mode == 1 || mode == 2 {
        mode
    } else {
        0
    }
}

pub fn texel_density_shader(mode: i32) -> &'static str {
    if mode == 3 || mode == 4 {
        "SketchTerrain.TexelDensityTerrainLayer"
    } else {
        "Sketch.TexelDensity"
    }
}
