/// Accumulates many small primitive runs into one mesh drawn with one material.
///
/// Usage per frame: [`MeshBatch::start`], any number of [`MeshBatch::add`],
/// then [`MeshBatch::finish`]. The batch is not drawn while open.

use std::sync::Arc;

use crate::error::Result;
use crate::math::BoundingSphere;
use crate::renderer::{IndexFormat, PrimitiveType, Renderer, VertexFormat};
use crate::render::draw_call::{DrawSource, DrawTarget};
use crate::resource::material::Material;
use crate::resource::mesh::Mesh;

pub struct MeshBatch {
    mesh: Mesh,
    material: Arc<Material>,
    /// Output offset (indices, or vertices when not indexed) of each `add`
    batch_index: Vec<u32>,
    started: bool,
}

impl MeshBatch {
    pub fn new(
        vertex_format: VertexFormat,
        primitive: PrimitiveType,
        material: Arc<Material>,
        index_format: Option<IndexFormat>,
    ) -> Self {
        Self {
            mesh: Mesh::new(vertex_format, primitive, index_format, true),
            material,
            batch_index: Vec::new(),
            started: false,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn set_material(&mut self, material: Arc<Material>) {
        self.material = material;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Offsets recorded by each `add` since the last `start`
    pub fn batch_index(&self) -> &[u32] {
        &self.batch_index
    }

    /// Clear contents and open the batch
    pub fn start(&mut self) {
        self.mesh.clear();
        self.batch_index.clear();
        self.started = true;
    }

    /// Append a primitive run (see [`Mesh::merge`] for strip stitching)
    ///
    /// # Panics
    ///
    /// Panics if the batch is not open, or if `indices` presence does not
    /// match the batch's indexed mode.
    pub fn add(&mut self, vertices: &[u8], indices: Option<&[u32]>) {
        assert!(self.started, "MeshBatch::add called outside start()/finish()");
        let offset = if self.mesh.is_indexed() {
            self.mesh.index_count()
        } else {
            self.mesh.vertex_count()
        };
        self.batch_index.push(offset);
        self.mesh.merge(vertices, indices);
    }

    /// Close the batch and recompute its bounds
    pub fn finish(&mut self) {
        self.started = false;
        self.mesh.invalidate_bounds();
        self.mesh.bounds();
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.mesh.bounding_sphere()
    }

    /// Draw the batched mesh; layer and light mask come from `source`
    pub fn draw(
        &self,
        renderer: &mut dyn Renderer,
        target: DrawTarget<'_>,
        source: &DrawSource,
    ) -> Result<()> {
        if self.started {
            crate::engine_warn!("nova3d::MeshBatch", "Skipping draw of an unfinished batch");
            return Ok(());
        }
        self.mesh.draw(renderer, target, source, &self.material)
    }
}

#[cfg(test)]
#[path = "mesh_batch_tests.rs"]
mod tests;
