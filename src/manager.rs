// src/manager.rs
//! Material manager: owns the default material and drives the global
//! switches (sketch mode, texel density view, frame id) across every live
//! material of one context.

use std::sync::Arc;

use crate::config::MaterialConfig;
use crate::context::MaterialContext;
use crate::error::Result;
use crate::flags::MaterialFlags;
use crate::material::Material;
use crate::material_name;
use crate::surface::SurfaceType;

pub const DEFAULT_MATERIAL_NAME: &str = "Default";

pub struct MaterialManager {
    ctx: Arc<MaterialContext>,
    default_material: Arc<Material>,
}

impl MaterialManager {
    pub fn new(ctx: Arc<MaterialContext>) -> Self {
        let default_material = Material::new(&ctx);
        default_material.set_name(DEFAULT_MATERIAL_NAME);
        ctx.set_default_material_handle(default_material.handle());
        log::info!("Material manager ready (default material {:?})", default_material.handle());
        Self {
            ctx,
            default_material,
        }
    }

    pub fn context(&self) -> &Arc<MaterialContext> {
        &self.ctx
    }

    /// New named material. Proxy flags implied by the name are added to `flags`.
    pub fn create_material(&self, name: &str, flags: MaterialFlags) -> Arc<Material> {
        let material = Material::new(&self.ctx);
        material.set_flags(flags);
        material.set_name(name);
        log::trace!("created material '{}'", name);
        material
    }

    pub fn default_material(&self) -> &Arc<Material> {
        &self.default_material
    }

    pub fn find_material(&self, name: &str) -> Option<Arc<Material>> {
        self.ctx.registry().find_by_name(name)
    }

    /// Live top-level materials; pure children follow their parent.
    fn top_level_materials(&self) -> Vec<Arc<Material>> {
        self.ctx
            .registry()
            .live()
            .into_iter()
            .filter(|m| !m.flags().contains(MaterialFlags::PURE_CHILD))
            .collect()
    }

    pub fn set_sketch_mode(&self, mode: i32) {
        self.ctx.store_sketch_mode(mode);
        let materials = self.top_level_materials();
        log::debug!("sketch mode {} on {} materials", mode, materials.len());
        for material in &materials {
            material.set_sketch_mode(mode);
        }
    }

    pub fn sketch_mode(&self) -> i32 {
        self.ctx.sketch_mode()
    }

    pub fn set_texel_density_debug(&self, mode: i32) {
        for material in &self.top_level_materials() {
            material.set_texel_density_debug(mode);
        }
    }

    pub fn begin_frame(&self, frame_id: u32) {
        self.ctx.frame().begin_frame(frame_id);
    }

    pub fn surface_type_by_name(&self, name: &str) -> Option<SurfaceType> {
        self.ctx.surface_types().surface_type_by_name(name, "")
    }

    /// Includes the default material.
    pub fn live_material_count(&self) -> usize {
        self.ctx.registry().len()
    }

    /// Canonical form of a material file name for lookups.
    pub fn unify_material_name(&self, name: &str) -> String {
        self.ctx
            .with_config(|c| material_name::unify_material_name(name, &c.game_folder))
    }

    pub fn config(&self) -> MaterialConfig {
        self.ctx.config()
    }

    pub fn set_config(&self, config: MaterialConfig) -> Result<()> {
        config.validate()?;
        self.ctx.set_config(config);
        Ok(())
    }

    /// Log every live material besides the default one, with its loading
    /// call stack when leak tracing is on. Returns how many were reported.
    pub fn report_live_materials(&self) -> usize {
        let live: Vec<Arc<Material>> = self
            .ctx
            .registry()
            .live()
            .into_iter()
            .filter(|m| !m.is_default())
            .collect();
        for material in &live {
            match material.loading_callstack() {
                Some(stack) => log::warn!(
                    "live material '{}' ({} refs), created at:\n{}",
                    material.name(),
                    material.ref_count() - 1,
                    stack
                ),
                None => log::warn!(
                    "live material '{}' ({} refs)",
                    material.name(),
                    material.ref_count() - 1
                ),
            }
        }
        live.len()
    }
}

impl Drop for MaterialManager {
    fn drop(&mut self) {
        let leaked = self.report_live_materials();
        if leaked > 0 {
            log::info!("Material manager dropped with {} live materials", leaked);
        }
    }
}
