// src/shader_item.rs
//! Shader item: a shader program handle paired with a resource set handle.
//!
//! The item owns one reference on each handle it holds. `Clone` takes new
//! references, `Drop` releases them. Installing an item into a material or
//! layer must go through their setters so the backend sees
//! clear -> release -> store -> update in that order.

use std::sync::Arc;

use crate::render::{ResourceTexture, Shader, ShaderResources};
use crate::texture_slots::TextureSlot;

#[derive(Clone, Default)]
pub struct ShaderItem {
    pub shader: Option<Arc<dyn Shader>>,
    pub resources: Option<Arc<dyn ShaderResources>>,
    pub technique: i32,
}

impl ShaderItem {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        shader: Option<Arc<dyn Shader>>,
        resources: Option<Arc<dyn ShaderResources>>,
    ) -> Self {
        Self {
            shader,
            resources,
            technique: 0,
        }
    }

    pub fn with_technique(mut self, technique: i32) -> Self {
        self.technique = technique;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.shader.is_none() && self.resources.is_none()
    }

    pub fn shader_name(&self) -> Option<&str> {
        self.shader.as_deref().map(|s| s.name())
    }

    /// Both handles point at the same objects as `other`'s.
    pub fn same_binding(&self, other: &ShaderItem) -> bool {
        fn same<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.shader, &other.shader) && same(&self.resources, &other.resources)
    }

    /// Every slot the resource set has a texture entry for.
    pub fn bound_textures(&self) -> impl Iterator<Item = (TextureSlot, ResourceTexture)> + '_ {
        TextureSlot::ALL.into_iter().filter_map(move |slot| {
            self.resources
                .as_deref()
                .and_then(|r| r.texture(slot))
                .map(|t| (slot, t))
        })
    }
}

impl std::fmt::Debug for ShaderItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderItem")
            .field("shader", &self.shader_name())
            .field("has_resources", &self.resources.is_some())
            .field("technique", &self.technique)
            .finish()
    }
}
