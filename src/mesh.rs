// src/mesh.rs
//! Render mesh chunk data consumed by streaming prediction.

/// One draw chunk of a render mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderChunk {
    /// Index into the owning material's sub-material list.
    pub material_id: u16,
    pub num_indices: u32,
    pub num_verts: u32,
    pub has_render_element: bool,
    /// Texel area per world area, scales the streaming mip factor.
    pub texel_area_density: f32,
}

impl RenderChunk {
    pub fn new(material_id: u16, num_indices: u32, num_verts: u32) -> Self {
        Self {
            material_id,
            num_indices,
            num_verts,
            has_render_element: true,
            texel_area_density: 1.0,
        }
    }

    pub fn with_texel_area_density(mut self, density: f32) -> Self {
        self.texel_area_density = density;
        self
    }

    /// Has a render element and actual geometry.
    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.has_render_element && self.num_indices > 0 && self.num_verts > 0
    }
}

/// A mesh as seen by the material core: two chunk lists.
pub trait RenderMesh {
    fn chunks(&self) -> &[RenderChunk];
    fn skinned_chunks(&self) -> &[RenderChunk];

    /// Regular chunks followed by skinned ones.
    fn all_chunks(&self) -> std::iter::Chain<std::slice::Iter<'_, RenderChunk>, std::slice::Iter<'_, RenderChunk>> {
        self.chunks().iter().chain(self.skinned_chunks().iter())
    }
}

/// Plain owned chunk lists.
#[derive(Debug, Clone, Default)]
pub struct ChunkedMesh {
    pub chunks: Vec<RenderChunk>,
    pub skinned: Vec<RenderChunk>,
}

impl ChunkedMesh {
    pub fn new(chunks: Vec<RenderChunk>) -> Self {
        Self {
            chunks,
            skinned: Vec::new(),
        }
    }

    pub fn with_skinned(mut self, skinned: Vec<RenderChunk>) -> Self {
        self.skinned = skinned;
        self
    }
}

impl RenderMesh for ChunkedMesh {
    fn chunks(&self) -> &[RenderChunk] {
        &self.chunks
    }

    fn skinned_chunks(&self) -> &[RenderChunk] {
        &self.skinned
    }
}
