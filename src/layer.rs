// src/layer.rs
//! Material layers: extra shader items drawn on top of a material (frozen,
//! wet, cloaked...). Selected per draw by a layer mask.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::material::Material;
use crate::render::{MemorySizer, RenderBackend};
use crate::shader_item::ShaderItem;

pub struct MaterialLayer {
    item: RwLock<ShaderItem>,
    renderer: Arc<dyn RenderBackend>,
}

impl MaterialLayer {
    pub(crate) fn new(renderer: Arc<dyn RenderBackend>) -> Self {
        Self {
            item: RwLock::new(ShaderItem::empty()),
            renderer,
        }
    }

    /// Install a copy of `item`. Resources are stamped with the parent's
    /// unique name; the backend forgets the old item before it is released.
    pub fn set_shader_item(&self, parent: &Material, item: &ShaderItem) {
        let new_item = item.clone();
        if let Some(res) = &new_item.resources {
            res.set_material_name(&parent.unique_name());
        }

        let mut current = self.item.write();
        self.renderer.clear_shader_item(&current);
        drop(std::mem::take(&mut *current));
        *current = new_item;
        self.renderer.update_shader_item(&current);
    }

    pub fn shader_item(&self) -> ShaderItem {
        self.item.read().clone()
    }

    /// Bytes of every bound texture slot, registered under
    /// "Textures/MemoryTexture". A texture bound to two slots counts twice.
    pub fn resource_memory_usage(&self, sizer: &mut MemorySizer) -> usize {
        let item = self.item.read();
        sizer.scoped("Textures", |sizer| {
            sizer.scoped("MemoryTexture", |sizer| {
                let mut total = 0;
                for (_, rt) in item.bound_textures() {
                    let Some(tex) = rt.texture else { continue };
                    let bytes = tex.data_size();
                    sizer.add_object(bytes);
                    sizer.add_resource(tex.name(), bytes);
                    total += bytes;
                }
                total
            })
        })
    }
}

impl Drop for MaterialLayer {
    fn drop(&mut self) {
        let item = self.item.get_mut();
        self.renderer.clear_shader_item(item);
        drop(std::mem::take(item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tex, Rig};
    use crate::render::ShaderResources;
    use crate::texture_slots::TextureSlot;

    #[test]
    fn set_shader_item_clears_before_release_and_updates_after_store() {
        let rig = Rig::new();
        let mat = rig.manager.create_material("frozen_rock", Default::default());
        let layer = mat.create_layer();

        let (first, first_res) = rig.item("Frozen", "first");
        layer.set_shader_item(&mat, &first);
        drop(first);
        assert_eq!(first_res.material_name(), "frozen_rock");
        drop(first_res);

        let (second, _) = rig.item("Wet", "second");
        rig.renderer.clear_events();
        layer.set_shader_item(&mat, &second);
        assert_eq!(
            rig.renderer.events(),
            vec![
                "clear Frozen".to_string(),
                "release shader Frozen".to_string(),
                "release resources first".to_string(),
                "update Wet".to_string(),
            ]
        );
        assert_eq!(layer.shader_item().shader_name(), Some("Wet"));
    }

    #[test]
    fn drop_releases_the_item() {
        let rig = Rig::new();
        let mat = rig.manager.create_material("m", Default::default());
        let layer = mat.create_layer();
        let (item, res) = rig.item("Frozen", "frozen");
        layer.set_shader_item(&mat, &item);
        drop(item);
        assert_eq!(Arc::strong_count(&res), 2);
        drop(layer);
        assert_eq!(Arc::strong_count(&res), 1);
    }

    #[test]
    fn texture_memory_counts_every_bound_slot() {
        let rig = Rig::new();
        let mat = rig.manager.create_material("m", Default::default());
        let layer = mat.create_layer();
        let (item, res) = rig.item("Frozen", "frozen");
        let (diffuse, _) = tex("ice_diff.dds", 256);
        res.bind(TextureSlot::Diffuse, diffuse.clone());
        res.bind(TextureSlot::DetailOverlay, diffuse);
        layer.set_shader_item(&mat, &item);

        let mut sizer = MemorySizer::with_resource_collector();
        assert_eq!(layer.resource_memory_usage(&mut sizer), 512);
        assert_eq!(sizer.component_total("Textures/MemoryTexture"), 512);
        assert_eq!(sizer.resources().len(), 2);
    }
}
