// src/flags.rs
//! Material flag bits and the render flags derived from a shader item.

use bitflags::bitflags;

use crate::render::{ShaderFlags, ShaderFlags2, ShaderType, TextureType};
use crate::shader_item::ShaderItem;
use crate::texture_slots::TextureSlot;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        const WIRE = 0x0001;
        const TWO_SIDED = 0x0002;
        const ADDITIVE = 0x0004;
        const DETAIL_DECAL = 0x0008;
        const LIGHTING = 0x0010;
        const NOSHADOW = 0x0020;
        const ALWAYS_USED = 0x0040;
        const PURE_CHILD = 0x0080;
        const MULTI_SUBMTL = 0x0100;
        const COLLISION_PROXY = 0x0200;
        const NODRAW = 0x0400;
        const REQUIRE_FORWARD_RENDERING = 0x0800;
        const NOT_INSTANCED = 0x1000;
        const RAYCAST_PROXY = 0x2000;
        const REQUIRE_NEAREST_CUBEMAP = 0x4000;
        const SHADER_ASSIGNED_TO_LAYERS = 0x8000;
    }
}

impl MaterialFlags {
    /// Bits owned by [`derive_render_flags`]; callers never set them.
    pub const DERIVED: MaterialFlags = MaterialFlags::REQUIRE_FORWARD_RENDERING
        .union(MaterialFlags::REQUIRE_NEAREST_CUBEMAP);
}

bitflags! {
    /// What `Material::copy_into` transfers besides surface type and flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CopyFlags: u32 {
        const NAME = 1 << 0;
        const TEXTURES = 1 << 1;
    }
}

/// Shader name that always wants the nearest cubemap when one is bound.
const EYE_SHADER: &str = "Eye";

/// Render requirements implied by `item`. Pure: same item, same result.
pub fn derive_render_flags(item: &ShaderItem) -> MaterialFlags {
    let mut out = MaterialFlags::empty();
    let Some(shader) = item.shader.as_deref() else {
        return out;
    };
    let resources = item.resources.as_deref();

    let flags = shader.flags();
    let flags2 = shader.flags2();
    let shader_type = shader.shader_type();

    let alpha_blended = flags.intersects(ShaderFlags::NODRAW | ShaderFlags::DECAL)
        || resources.map_or(false, |r| r.is_transparent());
    let is_hair = flags2.contains(ShaderFlags2::HAIR);
    let is_glass = shader_type == ShaderType::Glass;
    let is_water = shader_type == ShaderType::Water;
    let is_eye = shader.name() == EYE_SHADER;

    if alpha_blended && !flags2.contains(ShaderFlags2::NODRAW) && !flags.contains(ShaderFlags::DECAL) {
        out |= MaterialFlags::REQUIRE_FORWARD_RENDERING;
    } else if is_hair || is_glass {
        out |= MaterialFlags::REQUIRE_FORWARD_RENDERING;
    }

    let wants_cubemap = alpha_blended || is_hair || is_glass || is_water || is_eye;
    let nearest_cube_bound = resources
        .and_then(|r| r.texture(TextureSlot::Env))
        .map_or(false, |t| t.texture_type == TextureType::NearestCube);
    if wants_cubemap && nearest_cube_bound {
        out |= MaterialFlags::REQUIRE_NEAREST_CUBEMAP;
    }

    out
}
