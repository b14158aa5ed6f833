// src/test_support.rs
//! Recording doubles for the renderer-side traits. Test builds only.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use glam::Vec4;
use parking_lot::Mutex;

use crate::context::MaterialContext;
use crate::config::MaterialConfig;
use crate::flags::MaterialFlags;
use crate::frame::WorldSectors;
use crate::manager::MaterialManager;
use crate::material::Material;
use crate::render::{
    Camera, InputShaderResources, MemorySizer, PrecacheFlags, RenderBackend, ResourceTexture,
    Shader, ShaderFlags, ShaderFlags2, ShaderResources, ShaderType, Texture, TextureLoadFlags,
    TextureType,
};
use crate::shader_item::ShaderItem;
use crate::streaming::{RoundCounters, MAX_STREAM_PREDICTION_ZONES};
use crate::surface::SurfaceTypeTable;
use crate::texture_slots::TextureSlot;

/// Ordered record of backend calls and handle releases.
pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

// ---------- Shader ----------

pub(crate) struct MockShader {
    name: String,
    flags: ShaderFlags,
    flags2: ShaderFlags2,
    shader_type: ShaderType,
    generation_mask: u64,
    log: Option<EventLog>,
}

impl MockShader {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flags: ShaderFlags::empty(),
            flags2: ShaderFlags2::empty(),
            shader_type: ShaderType::General,
            generation_mask: 0,
            log: None,
        }
    }

    pub fn arc(name: &str) -> Arc<Self> {
        Self::new(name).into_arc()
    }

    pub fn with_type(mut self, shader_type: ShaderType) -> Self {
        self.shader_type = shader_type;
        self
    }

    pub fn with_flags(mut self, flags: ShaderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_flags2(mut self, flags2: ShaderFlags2) -> Self {
        self.flags2 = flags2;
        self
    }

    pub fn with_generation_mask(mut self, mask: u64) -> Self {
        self.generation_mask = mask;
        self
    }

    pub fn with_log(mut self, log: &EventLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Shader for MockShader {
    fn name(&self) -> &str {
        &self.name
    }
    fn flags(&self) -> ShaderFlags {
        self.flags
    }
    fn flags2(&self) -> ShaderFlags2 {
        self.flags2
    }
    fn shader_type(&self) -> ShaderType {
        self.shader_type
    }
    fn generation_mask(&self) -> u64 {
        self.generation_mask
    }
}

impl Drop for MockShader {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.lock().push(format!("release shader {}", self.name));
        }
    }
}

// ---------- Texture ----------

pub(crate) struct MockTexture {
    name: String,
    size: usize,
    streamed_in: AtomicBool,
    keep_system_copy: AtomicBool,
    queries: AtomicUsize,
}

impl MockTexture {
    pub fn arc(name: &str, size: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            size,
            streamed_in: AtomicBool::new(true),
            keep_system_copy: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn set_streamed_in(&self, streamed_in: bool) {
        self.streamed_in.store(streamed_in, Ordering::SeqCst);
    }

    pub fn keeps_system_copy(&self) -> bool {
        self.keep_system_copy.load(Ordering::SeqCst)
    }

    /// How many residency queries reached this texture.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Texture for MockTexture {
    fn name(&self) -> &str {
        &self.name
    }
    fn data_size(&self) -> usize {
        self.size
    }
    fn is_streamed_in(&self, _min_round_ids: &[i32; MAX_STREAM_PREDICTION_ZONES]) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.streamed_in.load(Ordering::SeqCst)
    }
    fn set_keep_system_copy(&self, keep: bool) {
        self.keep_system_copy.store(keep, Ordering::SeqCst);
    }
}

// ---------- Resources ----------

#[derive(Default)]
struct ResourceState {
    textures: HashMap<TextureSlot, ResourceTexture>,
    material_name: String,
    transparent: bool,
    alpha_ref: f32,
    strengths: HashMap<TextureSlot, f32>,
    colors: HashMap<TextureSlot, Vec4>,
    camera: Option<Camera>,
    constant_updates: usize,
}

pub(crate) struct MockResources {
    label: String,
    state: Mutex<ResourceState>,
    log: Option<EventLog>,
}

impl MockResources {
    pub fn arc() -> Arc<Self> {
        Self::labeled("resources", None)
    }

    pub fn labeled(label: &str, log: Option<&EventLog>) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            state: Mutex::new(ResourceState::default()),
            log: log.cloned(),
        })
    }

    pub fn from_input(label: &str, input: &InputShaderResources, log: Option<&EventLog>) -> Arc<Self> {
        let res = Self::labeled(label, log);
        {
            let mut st = res.state.lock();
            st.textures = input.textures.clone();
            st.alpha_ref = input.alpha_ref;
            st.colors.insert(TextureSlot::Diffuse, input.diffuse);
            st.colors.insert(TextureSlot::Specular, input.specular);
            st.colors.insert(TextureSlot::Emittance, input.emittance);
            st.strengths.insert(TextureSlot::Opacity, input.opacity);
            st.strengths.insert(TextureSlot::Smoothness, input.smoothness);
        }
        res
    }

    pub fn bind(&self, slot: TextureSlot, texture: ResourceTexture) {
        self.state.lock().textures.insert(slot, texture);
    }

    pub fn set_transparent(&self, transparent: bool) {
        self.state.lock().transparent = transparent;
    }

    pub fn constant_updates(&self) -> usize {
        self.state.lock().constant_updates
    }
}

impl ShaderResources for MockResources {
    fn texture(&self, slot: TextureSlot) -> Option<ResourceTexture> {
        self.state.lock().textures.get(&slot).cloned()
    }
    fn set_material_name(&self, name: &str) {
        self.state.lock().material_name = name.to_string();
    }
    fn material_name(&self) -> String {
        self.state.lock().material_name.clone()
    }
    fn is_transparent(&self) -> bool {
        self.state.lock().transparent
    }
    fn is_emissive(&self) -> bool {
        self.strength(TextureSlot::Emittance) > 0.0
    }
    fn alpha_ref(&self) -> f32 {
        self.state.lock().alpha_ref
    }
    fn set_alpha_ref(&self, value: f32) {
        self.state.lock().alpha_ref = value;
    }
    fn strength(&self, slot: TextureSlot) -> f32 {
        self.state.lock().strengths.get(&slot).copied().unwrap_or(0.0)
    }
    fn set_strength(&self, slot: TextureSlot, value: f32) {
        self.state.lock().strengths.insert(slot, value);
    }
    fn color(&self, slot: TextureSlot) -> Vec4 {
        self.state.lock().colors.get(&slot).copied().unwrap_or(Vec4::ZERO)
    }
    fn set_color(&self, slot: TextureSlot, value: Vec4) {
        self.state.lock().colors.insert(slot, value);
    }
    fn update_constants(&self, _shader: &dyn Shader) {
        self.state.lock().constant_updates += 1;
    }
    fn clone_constants(&self, src: &dyn ShaderResources) {
        let alpha_ref = src.alpha_ref();
        let strengths: Vec<(TextureSlot, f32)> = TextureSlot::ALL
            .into_iter()
            .map(|slot| (slot, src.strength(slot)))
            .filter(|(_, v)| *v != 0.0)
            .collect();
        let mut st = self.state.lock();
        st.alpha_ref = alpha_ref;
        st.strengths.extend(strengths);
    }
    fn camera(&self) -> Option<Camera> {
        self.state.lock().camera
    }
    fn set_camera(&self, camera: Option<Camera>) {
        self.state.lock().camera = camera;
    }
    fn resource_memory_usage(&self, sizer: &mut MemorySizer) -> usize {
        let st = self.state.lock();
        let bytes: usize = st
            .textures
            .values()
            .filter_map(|t| t.texture.as_ref())
            .map(|t| t.data_size())
            .sum();
        sizer.add_object(bytes);
        bytes
    }
    fn input_snapshot(&self) -> InputShaderResources {
        let st = self.state.lock();
        InputShaderResources {
            textures: st.textures.clone(),
            diffuse: st.colors.get(&TextureSlot::Diffuse).copied().unwrap_or(Vec4::ZERO),
            specular: st.colors.get(&TextureSlot::Specular).copied().unwrap_or(Vec4::ZERO),
            emittance: st.colors.get(&TextureSlot::Emittance).copied().unwrap_or(Vec4::ZERO),
            opacity: st.strengths.get(&TextureSlot::Opacity).copied().unwrap_or(0.0),
            smoothness: st.strengths.get(&TextureSlot::Smoothness).copied().unwrap_or(0.0),
            alpha_ref: st.alpha_ref,
        }
    }
}

impl Drop for MockResources {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.lock().push(format!("release resources {}", self.label));
        }
    }
}

// ---------- Renderer ----------

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PrecacheCall {
    pub shader: Option<String>,
    pub mip_factor: f32,
    pub flags: PrecacheFlags,
    pub round_id: i32,
    pub counter: i32,
}

#[derive(Default)]
pub(crate) struct MockRenderer {
    pub log: EventLog,
    shaders: Mutex<HashMap<String, Arc<MockShader>>>,
    missing: Mutex<HashSet<String>>,
    generation_masks: Mutex<Vec<u64>>,
    precache: Mutex<Vec<PrecacheCall>>,
    texture_loads: Mutex<Vec<(String, TextureLoadFlags)>>,
    released_inputs: AtomicUsize,
    built_items: AtomicUsize,
}

impl MockRenderer {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Loads of `name` fail.
    pub fn set_missing(&self, name: &str) {
        self.missing.lock().insert(name.to_string());
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().clear();
    }

    pub fn precache_calls(&self) -> Vec<PrecacheCall> {
        self.precache.lock().clone()
    }

    pub fn texture_loads(&self) -> Vec<(String, TextureLoadFlags)> {
        self.texture_loads.lock().clone()
    }

    /// Generation masks passed to `load_shader_item`, in call order.
    pub fn generation_masks(&self) -> Vec<u64> {
        self.generation_masks.lock().clone()
    }

    pub fn released_inputs(&self) -> usize {
        self.released_inputs.load(Ordering::SeqCst)
    }

    fn push(&self, event: String) {
        self.log.lock().push(event);
    }

    fn shader_arc(&self, name: &str) -> Option<Arc<MockShader>> {
        if self.missing.lock().contains(name) {
            return None;
        }
        let mut shaders = self.shaders.lock();
        let shader = shaders
            .entry(name.to_string())
            .or_insert_with(|| MockShader::arc(name));
        Some(shader.clone())
    }

    fn describe(item: &ShaderItem) -> String {
        item.shader_name().unwrap_or("<none>").to_string()
    }
}

impl RenderBackend for MockRenderer {
    fn clear_shader_item(&self, item: &ShaderItem) {
        self.push(format!("clear {}", Self::describe(item)));
    }

    fn update_shader_item(&self, item: &ShaderItem) {
        self.push(format!("update {}", Self::describe(item)));
    }

    fn force_update_shader_item(&self, item: &ShaderItem) {
        self.push(format!("force_update {}", Self::describe(item)));
    }

    fn refresh_shader_resource_constants(&self, item: &ShaderItem) {
        self.push(format!("refresh {}", Self::describe(item)));
    }

    fn load_shader(&self, name: &str) -> Option<Arc<dyn Shader>> {
        self.push(format!("load_shader {name}"));
        self.shader_arc(name).map(|s| s as Arc<dyn Shader>)
    }

    fn load_shader_item(
        &self,
        name: &str,
        resources: Option<&InputShaderResources>,
        generation_mask: u64,
    ) -> ShaderItem {
        self.push(format!("load_shader_item {name}"));
        self.generation_masks.lock().push(generation_mask);
        let Some(shader) = self.shader_arc(name) else {
            return ShaderItem::empty();
        };
        let resources = resources.map(|input| {
            let n = self.built_items.fetch_add(1, Ordering::SeqCst);
            MockResources::from_input(&format!("{name}#{n}"), input, None) as Arc<dyn ShaderResources>
        });
        ShaderItem::new(Some(shader as Arc<dyn Shader>), resources).with_technique(1)
    }

    fn release_input_shader_resources(&self, _resources: InputShaderResources) {
        self.released_inputs.fetch_add(1, Ordering::SeqCst);
    }

    fn precache_resource(
        &self,
        item: &ShaderItem,
        mip_factor: f32,
        flags: PrecacheFlags,
        round_id: i32,
        counter: i32,
    ) {
        self.precache.lock().push(PrecacheCall {
            shader: item.shader_name().map(str::to_string),
            mip_factor,
            flags,
            round_id,
            counter,
        });
    }

    fn load_texture(&self, name: &str, flags: TextureLoadFlags) -> Option<Arc<dyn Texture>> {
        self.texture_loads.lock().push((name.to_string(), flags));
        Some(MockTexture::arc(name, 0) as Arc<dyn Texture>)
    }
}

// ---------- World sectors ----------

/// Counts invalidations. A watched material's flags are read from inside
/// the callback.
#[derive(Default)]
pub(crate) struct CountingSectors {
    count: AtomicUsize,
    watched: Mutex<Option<Weak<Material>>>,
    seen_flags: Mutex<Vec<MaterialFlags>>,
}

impl CountingSectors {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn watch(&self, material: &Arc<Material>) {
        *self.watched.lock() = Some(Arc::downgrade(material));
    }

    pub fn seen_flags(&self) -> Vec<MaterialFlags> {
        self.seen_flags.lock().clone()
    }
}

impl WorldSectors for CountingSectors {
    fn mark_all_sectors_uncompiled(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        let watched = self.watched.lock().as_ref().and_then(Weak::upgrade);
        if let Some(material) = watched {
            self.seen_flags.lock().push(material.flags());
        }
    }
}

// ---------- Rig ----------

/// Texture handle bound under its own name.
pub(crate) fn tex(name: &str, size: usize) -> (ResourceTexture, Arc<MockTexture>) {
    let texture = MockTexture::arc(name, size);
    (
        ResourceTexture::new(name, TextureType::Tex2D).with_texture(texture.clone()),
        texture,
    )
}

/// A manager wired to recording doubles.
pub(crate) struct Rig {
    pub renderer: Arc<MockRenderer>,
    pub rounds: Arc<RoundCounters>,
    pub surfaces: Arc<SurfaceTypeTable>,
    pub terrain: Arc<CountingSectors>,
    pub vis_areas: Arc<CountingSectors>,
    pub manager: MaterialManager,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(MaterialConfig::default())
    }

    /// Editing mode on, so flag changes reach the sector sinks.
    pub fn with_sinks() -> Self {
        Self::with_config(MaterialConfig {
            editing: true,
            ..MaterialConfig::default()
        })
    }

    pub fn with_config(config: MaterialConfig) -> Self {
        let renderer = MockRenderer::arc();
        let rounds = Arc::new(RoundCounters::default());
        let surfaces = Arc::new(SurfaceTypeTable::new());
        let terrain = Arc::new(CountingSectors::default());
        let vis_areas = Arc::new(CountingSectors::default());
        let ctx = MaterialContext::builder(renderer.clone(), rounds.clone())
            .surface_types(surfaces.clone())
            .terrain(terrain.clone())
            .vis_areas(vis_areas.clone())
            .config(config)
            .build();
        Self {
            renderer,
            rounds,
            surfaces,
            terrain,
            vis_areas,
            manager: MaterialManager::new(ctx),
        }
    }

    pub fn ctx(&self) -> &Arc<MaterialContext> {
        self.manager.context()
    }

    /// Shader + resources item whose handles log their release.
    pub fn item(&self, shader: &str, resources: &str) -> (ShaderItem, Arc<MockResources>) {
        let res = MockResources::labeled(resources, Some(&self.renderer.log));
        let shader = MockShader::new(shader).with_log(&self.renderer.log).into_arc();
        (ShaderItem::new(Some(shader), Some(res.clone())), res)
    }
}
