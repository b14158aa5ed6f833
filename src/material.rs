// src/material.rs
//! Material: a named, flagged binding of one shader item, plus optional
//! sub-materials (multi-materials), layers and streaming prediction state.
//!
//! Materials are shared as `Arc<Material>`. The strong count is the
//! material's reference count: construction yields one owner and dropping
//! the last owner runs shutdown (backend notified, handles released,
//! registry entry removed). Sub-material slots hold `Weak` references; the
//! owner of a multi-material keeps its children alive.
//!
//! Lock order: never hold `state` while taking `sub_materials`, and never
//! hold either lock of one material while locking another material.

use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::context::MaterialContext;
use crate::debug_view::{self, SketchAction, SKETCH_OFF};
use crate::error::{Error, Result};
use crate::flags::{derive_render_flags, CopyFlags, MaterialFlags};
use crate::layer::MaterialLayer;
use crate::material_name::{is_collision_proxy_name, is_raycast_proxy_name};
use crate::mesh::{RenderChunk, RenderMesh};
use crate::params;
use crate::registry::MaterialHandle;
use crate::render::{
    Camera, MemorySizer, PrecacheFlags, Shader, ShaderFlags, ShaderResources, TextureLoadFlags,
};
use crate::shader_item::ShaderItem;
use crate::streaming::{StreamingPredictionZone, UpdateKind, MAX_STREAM_PREDICTION_ZONES};
use crate::surface::SurfaceType;
use crate::texture_slots::TextureSlot;

/// Opaque per-material data owned by editing tools.
pub type UserData = Arc<dyn Any + Send + Sync>;

struct MaterialState {
    name: String,
    unique_name: String,
    flags: MaterialFlags,
    surface_type_id: i32,
    shader_item: ShaderItem,
    // shader and technique to restore when a debug view is switched off
    pre_sketch: Option<(Arc<dyn Shader>, i32)>,
}

impl MaterialState {
    fn is_pre_sketch(&self, shader: &Arc<dyn Shader>) -> bool {
        self.pre_sketch
            .as_ref()
            .map_or(false, |(p, _)| Arc::ptr_eq(p, shader))
    }

    fn restore_pre_sketch(&mut self) {
        if let Some((shader, technique)) = self.pre_sketch.take() {
            self.shader_item.shader = Some(shader);
            self.shader_item.technique = technique;
        }
    }

    fn backup_pre_sketch(&mut self) {
        if self.pre_sketch.is_none() {
            if let Some(shader) = self.shader_item.shader.clone() {
                self.pre_sketch = Some((shader, self.shader_item.technique));
            }
        }
    }
}

/// Returns whether a shader is bound; world sectors are invalidated by the
/// caller once the state lock is released.
fn recompute_derived_flags(st: &mut MaterialState) -> bool {
    st.flags.remove(MaterialFlags::DERIVED);
    if st.shader_item.shader.is_none() {
        return false;
    }
    st.flags |= derive_render_flags(&st.shader_item);
    true
}

#[derive(Default)]
struct EditingData {
    user_data: Option<UserData>,
    link_name: String,
}

type LayerSlots = Vec<Option<Arc<MaterialLayer>>>;

pub struct Material {
    ctx: Arc<MaterialContext>,
    handle: MaterialHandle,
    state: RwLock<MaterialState>,
    sub_materials: RwLock<Vec<Option<Weak<Material>>>>,
    layers: Mutex<Option<LayerSlots>>,
    active_layer: Mutex<Option<Arc<MaterialLayer>>>,
    stream_zones: Mutex<[StreamingPredictionZone; MAX_STREAM_PREDICTION_ZONES]>,
    editing: Mutex<EditingData>,
    loading_callstack: Option<String>,
}

impl Material {
    /// A new, unnamed material with no shader item, registered with `ctx`.
    /// When the registry is full the material still works but carries an
    /// invalid handle and cannot be found by name.
    pub fn new(ctx: &Arc<MaterialContext>) -> Arc<Self> {
        let trace = ctx.with_config(|c| c.trace_material_leaks);
        Arc::new_cyclic(|weak| Material {
            ctx: ctx.clone(),
            handle: ctx.registry().register(weak.clone(), "").unwrap_or_else(|e| {
                log::error!("material not registered: {}", e);
                MaterialHandle::invalid()
            }),
            state: RwLock::new(MaterialState {
                name: String::new(),
                unique_name: String::new(),
                flags: MaterialFlags::empty(),
                surface_type_id: 0,
                shader_item: ShaderItem::empty(),
                pre_sketch: None,
            }),
            sub_materials: RwLock::new(Vec::new()),
            layers: Mutex::new(None),
            active_layer: Mutex::new(None),
            stream_zones: Mutex::new(Default::default()),
            editing: Mutex::new(EditingData::default()),
            loading_callstack: trace
                .then(|| std::backtrace::Backtrace::force_capture().to_string()),
        })
    }

    // ---------- Identity ----------

    pub fn handle(&self) -> MaterialHandle {
        self.handle
    }

    pub fn context(&self) -> &Arc<MaterialContext> {
        &self.ctx
    }

    /// Number of owners.
    pub fn ref_count(self: &Arc<Self>) -> usize {
        Arc::strong_count(self)
    }

    pub fn is_default(&self) -> bool {
        self.ctx.default_material_handle() == Some(self.handle)
    }

    fn is_self(&self, other: &Arc<Material>) -> bool {
        std::ptr::eq(Arc::as_ptr(other), self)
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn unique_name(&self) -> String {
        self.state.read().unique_name.clone()
    }

    pub fn flags(&self) -> MaterialFlags {
        self.state.read().flags
    }

    /// Replace the caller-owned flags. REQUIRE_FORWARD_RENDERING and
    /// REQUIRE_NEAREST_CUBEMAP follow the binding and are left untouched.
    pub fn set_flags(&self, flags: MaterialFlags) {
        let mut st = self.state.write();
        st.flags = (flags - MaterialFlags::DERIVED) | (st.flags & MaterialFlags::DERIVED);
    }

    /// Set the name and unique name, deriving proxy flags from markers in
    /// the name. Pure-child sub-materials inherit the unique name.
    pub fn set_name(&self, name: &str) {
        let multi = {
            let mut st = self.state.write();
            st.name = name.to_string();
            st.unique_name = name.to_string();
            if let Some(res) = &st.shader_item.resources {
                res.set_material_name(name);
            }
            if is_collision_proxy_name(name) {
                st.flags |= MaterialFlags::COLLISION_PROXY;
            } else if is_raycast_proxy_name(name) {
                st.flags |= MaterialFlags::RAYCAST_PROXY | MaterialFlags::NODRAW;
            }
            st.flags.contains(MaterialFlags::MULTI_SUBMTL)
        };

        if multi {
            for sub in self.sub_material_slots().into_iter().flatten() {
                if self.is_self(&sub) {
                    continue;
                }
                sub.inherit_parent_name(name);
            }
        }

        self.ctx.registry().rename(self.handle, name);
    }

    fn inherit_parent_name(&self, parent_name: &str) {
        let mut st = self.state.write();
        if st.flags.contains(MaterialFlags::PURE_CHILD) {
            st.unique_name = parent_name.to_string();
            if let Some(res) = &st.shader_item.resources {
                res.set_material_name(parent_name);
            }
        }
        if is_raycast_proxy_name(&st.unique_name) {
            st.flags |= MaterialFlags::RAYCAST_PROXY | MaterialFlags::NODRAW;
        }
    }

    // ---------- Shader item ----------

    /// Copy of the current binding (takes references).
    pub fn shader_item(&self) -> ShaderItem {
        self.state.read().shader_item.clone()
    }

    pub fn shader_resources(&self) -> Option<Arc<dyn ShaderResources>> {
        self.state.read().shader_item.resources.clone()
    }

    /// Bind a copy of `item`, then re-apply the active sketch mode.
    pub fn set_shader_item(&self, item: &ShaderItem) {
        self.install_shader_item(item.clone());
        let mode = self.ctx.sketch_mode();
        if mode != SKETCH_OFF {
            self.set_sketch_mode(mode);
        }
    }

    /// Bind `item`, taking over the references it already holds.
    pub fn assign_shader_item(&self, item: ShaderItem) {
        self.install_shader_item(item);
    }

    fn install_shader_item(&self, new_item: ShaderItem) {
        let renderer = self.ctx.renderer();
        let mut st = self.state.write();
        if let Some(res) = &new_item.resources {
            res.set_material_name(&st.unique_name);
        }

        renderer.clear_shader_item(&st.shader_item);
        drop(std::mem::take(&mut st.shader_item));
        // a previous debug-view backup belongs to the old binding
        st.pre_sketch = None;

        st.shader_item = new_item;
        renderer.update_shader_item(&st.shader_item);
        let bound = recompute_derived_flags(&mut st);
        drop(st);
        if bound {
            self.ctx.invalidate_world_sectors();
        }
    }

    /// Recompute REQUIRE_FORWARD_RENDERING and REQUIRE_NEAREST_CUBEMAP.
    pub fn update_material_flags(&self) {
        let bound = recompute_derived_flags(&mut self.state.write());
        if bound {
            self.ctx.invalidate_world_sectors();
        }
    }

    pub fn update_shader_items(&self) {
        let renderer = self.ctx.renderer();
        renderer.update_shader_item(&self.state.read().shader_item);
        for sub in self.sub_material_slots().into_iter().flatten() {
            if !self.is_self(&sub) {
                renderer.update_shader_item(&sub.state.read().shader_item);
            }
        }
    }

    pub fn refresh_shader_resource_constants(&self) {
        let renderer = self.ctx.renderer();
        renderer.refresh_shader_resource_constants(&self.state.read().shader_item);
        for sub in self.sub_material_slots().into_iter().flatten() {
            if !self.is_self(&sub) {
                renderer.refresh_shader_resource_constants(&sub.state.read().shader_item);
            }
        }
    }

    // ---------- Surface type ----------

    /// Resolve `name` through the surface registry. Unknown names give id 0.
    pub fn set_surface_type(&self, name: &str) {
        let context = self.name();
        let id = self
            .ctx
            .surface_types()
            .surface_type_by_name(name, &context)
            .map_or(0, |st| st.id);
        self.state.write().surface_type_id = id;
    }

    pub fn set_surface_type_id(&self, id: i32) {
        self.state.write().surface_type_id = id;
    }

    pub fn surface_type_id(&self) -> i32 {
        self.state.read().surface_type_id
    }

    pub fn surface_type(&self) -> Option<SurfaceType> {
        let (id, name) = {
            let st = self.state.read();
            (st.surface_type_id, st.name.clone())
        };
        self.ctx.surface_types().surface_type(id, &name)
    }

    /// Write one surface type id per sub-material slot (or just this
    /// material's id) into `out`. Returns how many entries were written.
    pub fn fill_surface_type_ids(&self, out: &mut [i32]) -> Result<usize> {
        let (own, multi) = {
            let st = self.state.read();
            (st.surface_type_id, st.flags.contains(MaterialFlags::MULTI_SUBMTL))
        };
        let subs = self.sub_material_slots();

        if !multi || subs.is_empty() {
            let Some(first) = out.first_mut() else {
                return Err(Error::out_of_range("surface type table", 0, 0));
            };
            *first = own;
            return Ok(1);
        }

        if out.len() < subs.len() {
            log::warn!(
                "surface type table of {} entries too small for {} sub-materials",
                out.len(),
                subs.len()
            );
            return Err(Error::out_of_range("surface type table", subs.len() - 1, out.len()));
        }
        for (dst, sub) in out.iter_mut().zip(&subs) {
            *dst = sub.as_ref().map_or(0, |m| m.surface_type_id());
        }
        Ok(subs.len())
    }

    // ---------- Sub-materials ----------

    /// Resize the sub-material list; marks this material MULTI_SUBMTL.
    pub fn set_sub_material_count(&self, count: usize) {
        let _resize = self.ctx.lock_sub_material_resize();
        self.state.write().flags |= MaterialFlags::MULTI_SUBMTL;
        self.sub_materials.write().resize(count, None);
    }

    fn slot_error(&self, what: &'static str, slot: usize, len: usize) -> Error {
        Error::out_of_range(what, slot, len).context(format!("material '{}'", self.name()))
    }

    pub fn sub_material_count(&self) -> usize {
        self.sub_materials.read().len()
    }

    pub fn set_sub_material(&self, slot: usize, sub: Option<&Arc<Material>>) -> Result<()> {
        let mut subs = self.sub_materials.write();
        let len = subs.len();
        if slot >= len {
            drop(subs);
            log::warn!("sub-material slot {} out of range ({} slots)", slot, len);
            return Err(self.slot_error("sub-material slot", slot, len));
        }
        subs[slot] = sub.map(Arc::downgrade);
        Ok(())
    }

    /// `None` for out-of-range slots, empty slots and dropped children.
    pub fn sub_material(&self, slot: usize) -> Option<Arc<Material>> {
        self.sub_materials.read().get(slot)?.as_ref()?.upgrade()
    }

    /// Sub-material for `slot`, never empty: a plain material answers with
    /// itself, a missing child with the manager's default material.
    pub fn safe_sub_material(self: &Arc<Self>, slot: usize) -> Arc<Material> {
        let subs = self.sub_material_slots();
        if subs.is_empty() || !self.flags().contains(MaterialFlags::MULTI_SUBMTL) {
            return self.clone();
        }
        if let Some(Some(sub)) = subs.get(slot) {
            return sub.clone();
        }
        self.ctx
            .default_material_handle()
            .and_then(|h| self.ctx.registry().get(h))
            .unwrap_or_else(|| self.clone())
    }

    /// Upgraded snapshot of the sub-material list.
    fn sub_material_slots(&self) -> Vec<Option<Arc<Material>>> {
        self.sub_materials
            .read()
            .iter()
            .map(|w| w.as_ref().and_then(Weak::upgrade))
            .collect()
    }

    fn other_sub_materials(&self) -> Vec<Arc<Material>> {
        self.sub_material_slots()
            .into_iter()
            .flatten()
            .filter(|m| !self.is_self(m))
            .collect()
    }

    // ---------- Layers ----------

    pub fn create_layer(&self) -> Arc<MaterialLayer> {
        Arc::new(MaterialLayer::new(self.ctx.renderer().clone()))
    }

    pub fn set_layer_count(&self, count: usize) {
        self.layers
            .lock()
            .get_or_insert_with(Vec::new)
            .resize(count, None);
    }

    pub fn layer_count(&self) -> usize {
        self.layers.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn set_layer(&self, slot: usize, layer: Arc<MaterialLayer>) -> Result<()> {
        let mut layers = self.layers.lock();
        let len = layers.as_ref().map_or(0, Vec::len);
        if let Some(entry) = layers.as_mut().and_then(|l| l.get_mut(slot)) {
            *entry = Some(layer);
            return Ok(());
        }
        drop(layers);
        log::warn!("layer slot {} out of range ({} slots)", slot, len);
        Err(self.slot_error("layer slot", slot, len))
    }

    pub fn layer(&self, slot: usize) -> Option<Arc<MaterialLayer>> {
        self.layers.lock().as_ref()?.get(slot)?.clone()
    }

    /// The layer for the lowest set bit of `layers_mask` that names an
    /// existing slot, recorded as the active layer.
    pub fn layer_for_mask(&self, layers_mask: u8, _usage_mask: u8) -> Option<Arc<MaterialLayer>> {
        if layers_mask == 0 {
            return None;
        }
        let layers = self.layers.lock();
        let slots = layers.as_ref()?;
        let slot = (0..slots.len().min(8)).find(|&i| layers_mask & (1 << i) != 0)?;
        let layer = slots[slot].clone();
        *self.active_layer.lock() = layer.clone();
        layer
    }

    pub fn active_layer(&self) -> Option<Arc<MaterialLayer>> {
        self.active_layer.lock().clone()
    }

    // ---------- Streaming ----------

    /// Predict texture needs for an object at `distance` drawing `mesh`
    /// with this material. Without a mesh every sub-material is requested.
    pub fn precache_material(
        &self,
        distance: f32,
        mesh: Option<&dyn RenderMesh>,
        full_update: bool,
        draw_near: bool,
    ) {
        let (min_distance, texel_density) = self.ctx.with_config(|c| {
            (
                c.stream_prediction_min_report_distance,
                c.stream_prediction_texel_density,
            )
        });

        let mut flags = PrecacheFlags::empty();
        let distance = if draw_near {
            flags |= PrecacheFlags::HIGH_PRIORITY;
            distance
        } else {
            distance.max(min_distance)
        };
        let mip_factor = distance * distance;

        match mesh {
            Some(mesh) => {
                for chunk in mesh.all_chunks() {
                    self.precache_chunk(mip_factor, flags, chunk, full_update, texel_density);
                }
            }
            None => {
                self.precache_textures(mip_factor, flags, full_update);
                for sub in self.other_sub_materials() {
                    sub.precache_textures(mip_factor, flags, full_update);
                }
            }
        }
    }

    fn precache_chunk(
        &self,
        mip_factor: f32,
        flags: PrecacheFlags,
        chunk: &RenderChunk,
        full_update: bool,
        texel_density: bool,
    ) {
        if !chunk.is_drawable() {
            self.precache_textures(mip_factor, flags, full_update);
            return;
        }

        let mip_factor = if texel_density {
            mip_factor * chunk.texel_area_density
        } else {
            mip_factor
        };

        let id = chunk.material_id as usize;
        let target = {
            let subs = self.sub_materials.read();
            if id < subs.len() {
                match subs[id].as_ref().and_then(Weak::upgrade) {
                    Some(sub) => Some(sub),
                    None => return,
                }
            } else {
                None
            }
        };
        log::trace!("precache chunk material_id {} mip {:.3}", id, mip_factor);
        match target {
            Some(sub) => sub.precache_textures(mip_factor, flags, full_update),
            None => self.precache_textures(mip_factor, flags, full_update),
        }
    }

    /// Ask for everything this material needs, now.
    pub fn request_textures_loading(&self, mip_factor: f32) {
        self.precache_textures(mip_factor, PrecacheFlags::START_LOADING, false);
    }

    /// Fold one request into the prediction zone for this update kind; the
    /// first request of a new round reaches the backend.
    pub fn precache_textures(&self, mip_factor: f32, flags: PrecacheFlags, full_update: bool) {
        let kind = UpdateKind::from_full_update(full_update);
        let round = self.ctx.rounds().round_id(kind);
        let high_priority = flags.contains(PrecacheFlags::HIGH_PRIORITY);
        let Some(flush) = self.stream_zones.lock()[kind.index()].record(mip_factor, high_priority, round)
        else {
            return;
        };

        let st = self.state.read();
        let item = &st.shader_item;
        let drawable = match (&item.shader, &item.resources) {
            (Some(shader), Some(_)) => !shader.flags().contains(ShaderFlags::NODRAW),
            _ => false,
        };
        if !drawable {
            return;
        }

        let mut out = flags & PrecacheFlags::START_LOADING;
        if self.ctx.with_config(|c| c.shaders_sync_load) {
            out |= PrecacheFlags::SYNCHRONOUS;
        }
        if kind == UpdateKind::Full {
            out |= PrecacheFlags::SINGLE_FRAME_PRIORITY_UPDATE;
        }
        if flush.high_priority {
            out |= PrecacheFlags::HIGH_PRIORITY;
        }
        log::debug!(
            "precache '{}' mip {:.3} round {} {:?}",
            st.name,
            flush.mip_factor,
            round,
            out
        );
        self.ctx
            .renderer()
            .precache_resource(item, flush.mip_factor, out, round, 1);
    }

    /// Snapshot of the prediction zone for one update kind.
    pub fn stream_zone(&self, kind: UpdateKind) -> StreamingPredictionZone {
        self.stream_zones.lock()[kind.index()]
    }

    /// Every texture the draw would sample is resident. With a mesh only the
    /// sub-materials its chunks reference are checked.
    pub fn is_streamed_in(
        &self,
        min_round_ids: &[i32; MAX_STREAM_PREDICTION_ZONES],
        mesh: Option<&dyn RenderMesh>,
    ) -> bool {
        match mesh {
            Some(mesh) => mesh
                .all_chunks()
                .all(|chunk| self.is_chunk_streamed_in(min_round_ids, chunk)),
            None => {
                self.are_textures_streamed_in(min_round_ids)
                    && self
                        .other_sub_materials()
                        .iter()
                        .all(|sub| sub.are_textures_streamed_in(min_round_ids))
            }
        }
    }

    fn is_chunk_streamed_in(
        &self,
        min_round_ids: &[i32; MAX_STREAM_PREDICTION_ZONES],
        chunk: &RenderChunk,
    ) -> bool {
        if !chunk.is_drawable() {
            return true;
        }
        let id = chunk.material_id as usize;
        let target = {
            let subs = self.sub_materials.read();
            if id < subs.len() {
                match subs[id].as_ref().and_then(Weak::upgrade) {
                    Some(sub) => Some(sub),
                    None => return true,
                }
            } else {
                None
            }
        };
        match target {
            Some(sub) => sub.are_textures_streamed_in(min_round_ids),
            None => self.are_textures_streamed_in(min_round_ids),
        }
    }

    /// Residency of one sub-material's textures. Empty slots count as
    /// resident.
    pub fn are_sub_material_textures_streamed_in(
        &self,
        slot: usize,
        min_round_ids: &[i32; MAX_STREAM_PREDICTION_ZONES],
    ) -> Result<bool> {
        let len = self.sub_material_count();
        if slot >= len {
            return Err(self.slot_error("sub-material slot", slot, len));
        }
        Ok(self
            .sub_material(slot)
            .map_or(true, |sub| sub.are_textures_streamed_in(min_round_ids)))
    }

    /// This material's own bound textures only.
    pub fn are_textures_streamed_in(&self, min_round_ids: &[i32; MAX_STREAM_PREDICTION_ZONES]) -> bool {
        let item = self.shader_item();
        let all_streamed = item
            .bound_textures()
            .filter_map(|(_, rt)| rt.texture)
            .all(|tex| tex.is_streamed_in(min_round_ids));
        all_streamed
    }

    /// Reload every bound texture of every sub-material without streaming.
    pub fn disable_texture_streaming(self: &Arc<Self>) {
        let renderer = self.ctx.renderer();
        let count = self.sub_material_count().max(1);
        for slot in 0..count {
            let mat = self.safe_sub_material(slot);
            let item = mat.shader_item();
            for (tex_slot, rt) in item.bound_textures() {
                if rt.name.is_empty() {
                    continue;
                }
                let mut flags = TextureLoadFlags::DONT_STREAM;
                if matches!(tex_slot, TextureSlot::Smoothness | TextureSlot::SecondSmoothness) {
                    flags |= TextureLoadFlags::ALPHA;
                }
                // the reload itself is the point; the extra handle goes straight back
                drop(renderer.load_texture(&rt.name, flags));
            }
        }
    }

    /// Keep a CPU copy of each diffuse map.
    pub fn set_keep_low_res_sys_copy_for_diffuse(&self) {
        let multi = self.flags().contains(MaterialFlags::MULTI_SUBMTL);
        let subs = self.sub_material_slots();
        for slot in 0..subs.len().max(1) {
            let res = match subs.get(slot) {
                Some(Some(sub)) if multi => sub.shader_resources(),
                _ => self.shader_resources(),
            };
            let diffuse = res
                .and_then(|r| r.texture(TextureSlot::Diffuse))
                .and_then(|rt| rt.texture);
            if let Some(tex) = diffuse {
                tex.set_keep_system_copy(true);
            }
        }
    }

    // ---------- Clone / copy ----------

    /// A new material with the same names, flags, surface type and an
    /// equivalent, independently owned shader item.
    pub fn clone_material(&self) -> Result<Arc<Material>> {
        let (name, unique_name, surface_type_id, flags, item) = {
            let st = self.state.read();
            (
                st.name.clone(),
                st.unique_name.clone(),
                st.surface_type_id,
                st.flags,
                st.shader_item.clone(),
            )
        };
        let Some(shader) = item.shader.as_ref() else {
            return Err(Error::custom(format!("material '{name}' has no shader to clone")));
        };

        let dst = Material::new(&self.ctx);
        {
            let mut d = dst.state.write();
            d.name = name.clone();
            d.unique_name = unique_name;
            d.surface_type_id = surface_type_id;
            d.flags = flags - MaterialFlags::DERIVED;
        }
        self.ctx.registry().rename(dst.handle, &name);

        let renderer = self.ctx.renderer();
        let snapshot = item
            .resources
            .as_ref()
            .map(|r| r.input_snapshot())
            .unwrap_or_default();
        let new_item = renderer.load_shader_item(shader.name(), Some(&snapshot), shader.generation_mask());
        if new_item.shader.is_none() {
            log::warn!("shader '{}' failed to reload while cloning '{}'", shader.name(), name);
        }
        dst.assign_shader_item(new_item);

        if let (Some(src), Some(res)) = (item.resources.as_ref(), dst.shader_resources()) {
            res.clone_constants(src.as_ref());
        }
        renderer.release_input_shader_resources(snapshot);
        Ok(dst)
    }

    /// Copy surface type, flags and the shader binding into `dest`. Without
    /// `CopyFlags::TEXTURES` the destination keeps its own textures.
    pub fn copy_into(&self, dest: &Material, flags: CopyFlags) {
        if std::ptr::eq(self, dest) {
            return;
        }
        let (name, unique_name, surface_type_id, mtl_flags, item) = {
            let st = self.state.read();
            (
                st.name.clone(),
                st.unique_name.clone(),
                st.surface_type_id,
                st.flags,
                st.shader_item.clone(),
            )
        };

        {
            let mut d = dest.state.write();
            if flags.contains(CopyFlags::NAME) {
                d.name = name.clone();
                d.unique_name = unique_name;
            }
            d.surface_type_id = surface_type_id;
            // derived bits stay with dest's binding until a new one is assigned
            d.flags = (mtl_flags - MaterialFlags::DERIVED) | (d.flags & MaterialFlags::DERIVED);
        }
        if flags.contains(CopyFlags::NAME) {
            dest.ctx.registry().rename(dest.handle, &name);
        }

        let (Some(shader), Some(src_res)) = (item.shader.as_ref(), item.resources.as_ref()) else {
            return;
        };
        let mut input = src_res.input_snapshot();
        if !flags.contains(CopyFlags::TEXTURES) {
            input.textures = dest
                .shader_resources()
                .map(|r| r.input_snapshot().textures)
                .unwrap_or_default();
        }

        let renderer = self.ctx.renderer();
        let new_item = renderer.load_shader_item(shader.name(), Some(&input), shader.generation_mask());
        if new_item.shader.is_none() {
            log::warn!("shader '{}' failed to reload while copying '{}'", shader.name(), name);
        }
        dest.assign_shader_item(new_item);
        if let Some(res) = dest.shader_resources() {
            res.clone_constants(src_res.as_ref());
        }
        renderer.release_input_shader_resources(input);
    }

    // ---------- Parameters ----------

    pub fn set_material_param_float(&self, name: &str, value: f32) -> bool {
        self.set_param(|res| params::set_param_float(res, name, value))
    }

    pub fn material_param_float(&self, name: &str) -> Option<f32> {
        params::param_float(self.shader_resources()?.as_ref(), name)
    }

    pub fn set_material_param_vec3(&self, name: &str, value: glam::Vec3) -> bool {
        self.set_param(|res| params::set_param_vec3(res, name, value))
    }

    pub fn material_param_vec3(&self, name: &str) -> Option<glam::Vec3> {
        params::param_vec3(self.shader_resources()?.as_ref(), name)
    }

    fn set_param(&self, apply: impl FnOnce(&dyn ShaderResources) -> bool) -> bool {
        let item = self.shader_item();
        let Some(res) = item.resources.as_deref() else {
            return false;
        };
        let was_emissive = res.is_emissive();
        if !apply(res) {
            return false;
        }
        if let Some(shader) = item.shader.as_deref() {
            if was_emissive != res.is_emissive() {
                self.ctx.renderer().force_update_shader_item(&item);
            }
            res.update_constants(shader);
        }
        true
    }

    pub fn set_camera(&self, camera: Camera) {
        if let Some(res) = self.shader_resources() {
            res.set_camera(Some(camera));
        }
    }

    // ---------- Debug views ----------

    /// Swap in (mode != 0) or restore (mode 0) the sketch shader, here and
    /// in every sub-material.
    pub fn set_sketch_mode(&self, mode: i32) {
        if !self.ctx.with_config(|c| c.support_material_sketch) {
            return;
        }
        let renderer = self.ctx.renderer();
        {
            let mut st = self.state.write();
            if mode == SKETCH_OFF {
                st.restore_pre_sketch();
            } else {
                let action = match &st.shader_item.shader {
                    Some(shader) if !st.is_pre_sketch(shader) => {
                        debug_view::sketch_policy(shader.shader_type(), mode)
                    }
                    _ => debug_view::sketch_replacement(mode),
                };
                let SketchAction::Replace { shader, via_item } = action else {
                    return;
                };
                st.backup_pre_sketch();
                match (shader, via_item) {
                    (Some(name), true) => {
                        let tmp = renderer.load_shader_item(name, None, 0);
                        st.shader_item.technique = tmp.technique;
                        st.shader_item.shader = tmp.shader;
                    }
                    (Some(name), false) => {
                        st.shader_item.shader = renderer.load_shader(name);
                        st.shader_item.technique = 0;
                    }
                    (None, _) => {}
                }
            }
        }

        for sub in self.other_sub_materials() {
            sub.set_sketch_mode(mode);
        }
    }

    /// Texel density debug view. The effective mode for this material's
    /// shader type is passed on to sub-materials.
    pub fn set_texel_density_debug(&self, mode: i32) {
        if !self.ctx.with_config(|c| c.support_material_sketch) {
            return;
        }
        let mut effective = mode;
        {
            let mut st = self.state.write();
            if let Some(shader) = st.shader_item.shader.clone() {
                let ty = st
                    .pre_sketch
                    .as_ref()
                    .map_or_else(|| shader.shader_type(), |(p, _)| p.shader_type());
                effective = debug_view::texel_density_policy(ty, mode, st.surface_type_id);
                if effective == SKETCH_OFF {
                    st.restore_pre_sketch();
                } else {
                    st.backup_pre_sketch();
                    let tmp = self.ctx.renderer().load_shader_item(
                        debug_view::texel_density_shader(effective),
                        None,
                        0,
                    );
                    st.shader_item.technique = tmp.technique;
                    st.shader_item.shader = tmp.shader;
                }
            }
        }

        for sub in self.other_sub_materials() {
            sub.set_texel_density_debug(effective);
        }
    }

    // ---------- Memory ----------

    /// Bytes of distinct textures bound to the requested sub-material slot,
    /// or to all slots.
    pub fn texture_memory_usage(&self, mut sizer: Option<&mut MemorySizer>, sub_slot: Option<usize>) -> usize {
        let multi = self.flags().contains(MaterialFlags::MULTI_SUBMTL);
        let subs = self.sub_material_slots();
        let len = subs.len();

        let (start, mut end) = match sub_slot {
            Some(slot) => (slot, slot.saturating_add(1)),
            None => (0, len),
        };
        if end >= len {
            end = len;
        }
        if end == 0 {
            end = 1;
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for slot in start..end {
            let res = match subs.get(slot) {
                Some(Some(sub)) if multi => sub.shader_resources(),
                _ => self.shader_resources(),
            };
            let Some(res) = res else { continue };
            for tex_slot in TextureSlot::ALL {
                let Some(tex) = res.texture(tex_slot).and_then(|rt| rt.texture) else {
                    continue;
                };
                if !seen.insert(Arc::as_ptr(&tex) as *const () as usize) {
                    continue;
                }
                let bytes = tex.data_size();
                total += bytes;
                if let Some(sizer) = sizer.as_deref_mut() {
                    sizer.add_object(bytes);
                    sizer.add_resource(tex.name(), bytes);
                }
            }
        }
        total
    }

    /// Backend resource memory of layers, own resources and sub-materials.
    pub fn resource_memory_usage(&self, sizer: &mut MemorySizer) -> usize {
        let layers: Vec<Arc<MaterialLayer>> = self
            .layers
            .lock()
            .iter()
            .flatten()
            .flatten()
            .cloned()
            .collect();
        let res = self.shader_resources();
        let subs = self.other_sub_materials();

        sizer.scoped("Material", |sizer| {
            let mut total = 0;
            for layer in &layers {
                total += layer.resource_memory_usage(sizer);
            }
            if let Some(res) = &res {
                total += res.resource_memory_usage(sizer);
            }
            for sub in &subs {
                total += sub.resource_memory_usage(sizer);
            }
            total
        })
    }

    /// CPU-side footprint of this object.
    pub fn memory_usage(&self, sizer: &mut MemorySizer) {
        let sub_capacity = self.sub_materials.read().capacity();
        let layer_count = self.layer_count();
        sizer.scoped("Material", |sizer| {
            sizer.add_object(std::mem::size_of::<Material>());
            sizer.add_object(sub_capacity * std::mem::size_of::<Option<Weak<Material>>>());
            sizer.add_object(layer_count * std::mem::size_of::<MaterialLayer>());
        });
    }

    // ---------- Editing ----------

    fn editing_supported(&self) -> bool {
        self.ctx.with_config(|c| c.support_material_editing)
    }

    pub fn set_user_data(&self, data: Option<UserData>) {
        if self.editing_supported() {
            self.editing.lock().user_data = data;
        }
    }

    pub fn user_data(&self) -> Result<Option<UserData>> {
        if !self.editing_supported() {
            return Err(Error::Unsupported("material user data"));
        }
        Ok(self.editing.lock().user_data.clone())
    }

    pub fn set_material_link_name(&self, name: &str) {
        if self.editing_supported() {
            self.editing.lock().link_name = name.to_string();
        }
    }

    pub fn material_link_name(&self) -> Result<String> {
        if !self.editing_supported() {
            return Err(Error::Unsupported("material link names"));
        }
        Ok(self.editing.lock().link_name.clone())
    }

    /// Where this material was created, when leak tracing is on.
    pub fn loading_callstack(&self) -> Option<&str> {
        self.loading_callstack.as_deref()
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        *self.active_layer.get_mut() = None;
        self.layers.get_mut().take();

        let st = self.state.get_mut();
        if let Some(res) = &st.shader_item.resources {
            res.set_camera(None);
        }
        st.pre_sketch = None;
        self.ctx.renderer().clear_shader_item(&st.shader_item);
        drop(std::mem::take(&mut st.shader_item));

        self.sub_materials.get_mut().clear();
        self.ctx.registry().unregister(self.handle);
        log::trace!("material '{}' released", st.name);
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.read();
        f.debug_struct("Material")
            .field("name", &st.name)
            .field("flags", &st.flags)
            .field("surface_type_id", &st.surface_type_id)
            .field("shader_item", &st.shader_item)
            .field("sub_materials", &self.sub_materials.read().len())
            .finish()
    }
}
