// src/render.rs
//! Renderer-side collaborators.
//!
//! The material core never talks to a GPU. It holds reference-counted
//! handles to shaders, shader resource sets and textures owned by a
//! backend, and notifies that backend through [`RenderBackend`]. Handles are
//! `Arc`s: cloning one is the backend's AddRef, dropping it is Release, and
//! the backend frees the object when the last handle goes away.

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use glam::{Vec3, Vec4};

use crate::shader_item::ShaderItem;
use crate::streaming::MAX_STREAM_PREDICTION_ZONES;
use crate::texture_slots::TextureSlot;

// ---------- Shader classification ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    General,
    Metal,
    Glass,
    Vegetation,
    Ice,
    Terrain,
    Shadow,
    Water,
    FX,
    PostProcess,
    HDR,
    Sky,
    Skin,
    Hair,
    Particle,
    Compute,
}

bitflags! {
    /// Primary shader flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderFlags: u32 {
        const NODRAW = 1 << 0;
        const DECAL = 1 << 1;
        const SKY = 1 << 2;
        const HASVSHADER = 1 << 3;
        const LOCALCONSTANTS = 1 << 4;
    }
}

bitflags! {
    /// Secondary shader flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderFlags2: u32 {
        const NODRAW = 1 << 0;
        const HAIR = 1 << 1;
        const DETAILBUMPMAPPING = 1 << 2;
        const FORCE_ZPASS = 1 << 3;
    }
}

bitflags! {
    /// Flags passed with a precache request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PrecacheFlags: u32 {
        const HIGH_PRIORITY = 1 << 0;
        const SYNCHRONOUS = 1 << 1;
        const START_LOADING = 1 << 2;
        const SINGLE_FRAME_PRIORITY_UPDATE = 1 << 3;
    }
}

bitflags! {
    /// Flags for [`RenderBackend::load_texture`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureLoadFlags: u32 {
        const DONT_STREAM = 1 << 0;
        const ALPHA = 1 << 1;
    }
}

/// Sampler type a resource slot was authored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    Tex2D,
    Tex3D,
    Cube,
    AutoCube,
    NearestCube,
    Dyn2D,
    User,
}

// ---------- Handles ----------

pub trait Shader: Send + Sync {
    fn name(&self) -> &str;
    fn flags(&self) -> ShaderFlags;
    fn flags2(&self) -> ShaderFlags2;
    fn shader_type(&self) -> ShaderType;
    /// Technique-independent generation mask, used to rebuild an equivalent item.
    fn generation_mask(&self) -> u64;
}

pub trait Texture: Send + Sync {
    fn name(&self) -> &str;
    fn data_size(&self) -> usize;
    /// Resident at the quality requested by each prediction zone's round.
    fn is_streamed_in(&self, min_round_ids: &[i32; MAX_STREAM_PREDICTION_ZONES]) -> bool;
    fn set_keep_system_copy(&self, keep: bool);
}

/// A texture bound into a resource slot.
#[derive(Clone)]
pub struct ResourceTexture {
    pub name: String,
    pub texture_type: TextureType,
    pub texture: Option<Arc<dyn Texture>>,
}

impl ResourceTexture {
    pub fn new(name: impl Into<String>, texture_type: TextureType) -> Self {
        Self {
            name: name.into(),
            texture_type,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: Arc<dyn Texture>) -> Self {
        self.texture = Some(texture);
        self
    }
}

impl std::fmt::Debug for ResourceTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTexture")
            .field("name", &self.name)
            .field("texture_type", &self.texture_type)
            .field("loaded", &self.texture.is_some())
            .finish()
    }
}

/// Debug camera associated with a resource set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub direction: Vec3,
    pub fov: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::Y,
            fov: 75.0_f32.to_radians(),
        }
    }
}

/// Author-side description of a resource set: texture names per slot,
/// lighting colours and alpha reference. The backend builds a live
/// [`ShaderResources`] from it.
#[derive(Debug, Clone, Default)]
pub struct InputShaderResources {
    pub textures: HashMap<TextureSlot, ResourceTexture>,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emittance: Vec4,
    pub opacity: f32,
    pub smoothness: f32,
    pub alpha_ref: f32,
}

/// A live, backend-owned set of shader inputs. Shared between materials, so
/// every mutator takes `&self`; implementations use interior locking.
pub trait ShaderResources: Send + Sync {
    fn texture(&self, slot: TextureSlot) -> Option<ResourceTexture>;
    /// Used by the backend's diagnostics only.
    fn set_material_name(&self, name: &str);
    fn material_name(&self) -> String;
    fn is_transparent(&self) -> bool;
    fn is_emissive(&self) -> bool;
    fn alpha_ref(&self) -> f32;
    fn set_alpha_ref(&self, value: f32);
    fn strength(&self, slot: TextureSlot) -> f32;
    fn set_strength(&self, slot: TextureSlot, value: f32);
    fn color(&self, slot: TextureSlot) -> Vec4;
    fn set_color(&self, slot: TextureSlot, value: Vec4);
    fn update_constants(&self, shader: &dyn Shader);
    fn clone_constants(&self, src: &dyn ShaderResources);
    fn camera(&self) -> Option<Camera>;
    fn set_camera(&self, camera: Option<Camera>);
    fn resource_memory_usage(&self, sizer: &mut MemorySizer) -> usize;
    /// Snapshot of the author-side inputs, used when rebuilding an item.
    fn input_snapshot(&self) -> InputShaderResources;
}

/// The backend entry points the material core calls.
pub trait RenderBackend: Send + Sync {
    /// Drop any cached per-draw pointers into `item`; its handles are about
    /// to be released.
    fn clear_shader_item(&self, item: &ShaderItem);
    /// `item` is now live; rebuild derived state.
    fn update_shader_item(&self, item: &ShaderItem);
    fn force_update_shader_item(&self, item: &ShaderItem);
    fn refresh_shader_resource_constants(&self, item: &ShaderItem);
    fn load_shader(&self, name: &str) -> Option<Arc<dyn Shader>>;
    /// Failures come back as an item with empty handles.
    fn load_shader_item(
        &self,
        name: &str,
        resources: Option<&InputShaderResources>,
        generation_mask: u64,
    ) -> ShaderItem;
    /// Free backend allocations referenced by a temporary snapshot.
    fn release_input_shader_resources(&self, resources: InputShaderResources);
    fn precache_resource(
        &self,
        item: &ShaderItem,
        mip_factor: f32,
        flags: PrecacheFlags,
        round_id: i32,
        counter: i32,
    );
    fn load_texture(&self, name: &str, flags: TextureLoadFlags) -> Option<Arc<dyn Texture>>;
}

// ---------- Memory accounting ----------

/// Collects memory usage reports, grouped by component path.
#[derive(Debug, Default)]
pub struct MemorySizer {
    components: Vec<&'static str>,
    totals: HashMap<String, usize>,
    resources: Vec<(String, usize)>,
    collect_resources: bool,
}

impl MemorySizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also keep a list of named resources (texture names and sizes).
    pub fn with_resource_collector() -> Self {
        Self {
            collect_resources: true,
            ..Self::default()
        }
    }

    pub fn push_component(&mut self, name: &'static str) {
        self.components.push(name);
    }

    pub fn pop_component(&mut self) {
        self.components.pop();
    }

    /// Run `f` with `name` pushed as the current component.
    pub fn scoped<R>(&mut self, name: &'static str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_component(name);
        let r = f(self);
        self.pop_component();
        r
    }

    pub fn add_object(&mut self, bytes: usize) {
        let key = self.components.join("/");
        *self.totals.entry(key).or_insert(0) += bytes;
    }

    pub fn add_resource(&mut self, name: &str, bytes: usize) {
        if self.collect_resources {
            self.resources.push((name.to_string(), bytes));
        }
    }

    pub fn component_total(&self, path: &str) -> usize {
        self.totals.get(path).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.totals.values().sum()
    }

    pub fn resources(&self) -> &[(String, usize)] {
        &self.resources
    }
}
