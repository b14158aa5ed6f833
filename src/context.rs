// src/context.rs
//! Shared state every material of one manager points at: collaborators,
//! configuration, frame clock, sketch mode and the live registry.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::MaterialConfig;
use crate::frame::{FrameClock, WorldSectors};
use crate::registry::{MaterialHandle, MaterialRegistry, MAX_MATERIALS};
use crate::render::RenderBackend;
use crate::streaming::StreamingRounds;
use crate::surface::{SurfaceTypeRegistry, SurfaceTypeTable};

pub struct MaterialContext {
    renderer: Arc<dyn RenderBackend>,
    rounds: Arc<dyn StreamingRounds>,
    surface_types: Arc<dyn SurfaceTypeRegistry>,
    terrain: Option<Arc<dyn WorldSectors>>,
    vis_areas: Option<Arc<dyn WorldSectors>>,
    config: RwLock<MaterialConfig>,
    frame: FrameClock,
    sketch_mode: AtomicI32,
    registry: MaterialRegistry,
    default_material: AtomicU32,
    // serialises sub-material list resizes across all materials
    sub_material_resize: Mutex<()>,
}

pub struct MaterialContextBuilder {
    renderer: Arc<dyn RenderBackend>,
    rounds: Arc<dyn StreamingRounds>,
    surface_types: Option<Arc<dyn SurfaceTypeRegistry>>,
    terrain: Option<Arc<dyn WorldSectors>>,
    vis_areas: Option<Arc<dyn WorldSectors>>,
    config: MaterialConfig,
    max_materials: usize,
}

impl MaterialContextBuilder {
    pub fn surface_types(mut self, surface_types: Arc<dyn SurfaceTypeRegistry>) -> Self {
        self.surface_types = Some(surface_types);
        self
    }

    pub fn terrain(mut self, terrain: Arc<dyn WorldSectors>) -> Self {
        self.terrain = Some(terrain);
        self
    }

    pub fn vis_areas(mut self, vis_areas: Arc<dyn WorldSectors>) -> Self {
        self.vis_areas = Some(vis_areas);
        self
    }

    pub fn config(mut self, config: MaterialConfig) -> Self {
        self.config = config;
        self
    }

    /// Cap on live registered materials, default [`MAX_MATERIALS`].
    pub fn max_materials(mut self, max_materials: usize) -> Self {
        self.max_materials = max_materials;
        self
    }

    pub fn build(self) -> Arc<MaterialContext> {
        Arc::new(MaterialContext {
            renderer: self.renderer,
            rounds: self.rounds,
            surface_types: self
                .surface_types
                .unwrap_or_else(|| Arc::new(SurfaceTypeTable::new())),
            terrain: self.terrain,
            vis_areas: self.vis_areas,
            config: RwLock::new(self.config),
            frame: FrameClock::new(),
            sketch_mode: AtomicI32::new(0),
            registry: MaterialRegistry::with_capacity(self.max_materials),
            default_material: AtomicU32::new(u32::MAX),
            sub_material_resize: Mutex::new(()),
        })
    }
}

impl MaterialContext {
    pub fn builder(
        renderer: Arc<dyn RenderBackend>,
        rounds: Arc<dyn StreamingRounds>,
    ) -> MaterialContextBuilder {
        MaterialContextBuilder {
            renderer,
            rounds,
            surface_types: None,
            terrain: None,
            vis_areas: None,
            config: MaterialConfig::default(),
            max_materials: MAX_MATERIALS,
        }
    }

    #[inline]
    pub fn renderer(&self) -> &Arc<dyn RenderBackend> {
        &self.renderer
    }

    #[inline]
    pub fn rounds(&self) -> &Arc<dyn StreamingRounds> {
        &self.rounds
    }

    #[inline]
    pub fn surface_types(&self) -> &Arc<dyn SurfaceTypeRegistry> {
        &self.surface_types
    }

    #[inline]
    pub fn frame(&self) -> &FrameClock {
        &self.frame
    }

    #[inline]
    pub fn registry(&self) -> &MaterialRegistry {
        &self.registry
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> MaterialConfig {
        self.config.read().clone()
    }

    /// Read one value without cloning the whole config.
    pub fn with_config<R>(&self, f: impl FnOnce(&MaterialConfig) -> R) -> R {
        f(&self.config.read())
    }

    pub fn set_config(&self, config: MaterialConfig) {
        *self.config.write() = config;
    }

    pub fn sketch_mode(&self) -> i32 {
        self.sketch_mode.load(Ordering::Acquire)
    }

    pub(crate) fn store_sketch_mode(&self, mode: i32) {
        self.sketch_mode.store(mode, Ordering::Release);
    }

    pub fn default_material_handle(&self) -> Option<MaterialHandle> {
        match self.default_material.load(Ordering::Acquire) {
            u32::MAX => None,
            raw => Some(MaterialHandle::from_raw(raw)),
        }
    }

    pub(crate) fn set_default_material_handle(&self, handle: MaterialHandle) {
        self.default_material.store(handle.raw(), Ordering::Release);
    }

    pub(crate) fn lock_sub_material_resize(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.sub_material_resize.lock()
    }

    /// Tell terrain and vis areas to recompile their sectors, at most once
    /// per frame and only while editing.
    pub(crate) fn invalidate_world_sectors(&self) {
        if !self.with_config(|c| c.editing) {
            return;
        }
        let (Some(terrain), Some(vis_areas)) = (&self.terrain, &self.vis_areas) else {
            return;
        };
        if self.frame.claim_sector_invalidation() {
            log::debug!(
                "material flags changed, recompiling world sectors (frame {})",
                self.frame.current_frame()
            );
            terrain.mark_all_sectors_uncompiled();
            vis_areas.mark_all_sectors_uncompiled();
        }
    }
}
