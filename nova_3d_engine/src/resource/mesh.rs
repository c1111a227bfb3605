/// Mesh: vertex format, topology and a pair of shared RenderBuffers.
///
/// A Mesh draws a range of its buffers: the whole buffer, or a sub-range for
/// mesh parts created with [`Mesh::create_mesh_part`]. Parts alias the same
/// [`SharedRenderBuffer`]s as their parent, so writing through one of them is
/// visible to all.
///
/// GPU objects (buffers and the vertex binding) are created on first draw.
/// Buffer contents are re-uploaded only when content-dirty, and the vertex
/// binding is rebuilt only when the GPU vertex buffer behind it changed.
///
/// Bounds are computed lazily from the position element and cached until
/// [`Mesh::invalidate_bounds`].

use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use glam::Vec3;

use crate::error::{Error, Result};
use crate::math::{BoundingBox, BoundingSphere, Ray, PICK_TOLERANCE};
use crate::renderer::{
    Buffer, BufferUsage, DrawCommand, IndexFormat, PrimitiveType, Renderer, VertexBinding,
    VertexElement, VertexFormat, VertexUsage,
};
use crate::render::draw_call::{DrawCall, DrawSource, DrawTarget};
use crate::render::submit::{submit_draw_call, SubmitOptions};
use crate::resource::material::Material;
use crate::resource::render_buffer::{lock, RenderBuffer, SharedRenderBuffer};

/// Upper bound on vertex elements accepted from a mesh stream
const MAX_STREAM_ELEMENTS: u32 = 16;

// ===== BOUNDS =====

/// Cached bounding volumes of a mesh, in mesh space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshBounds {
    pub bbox: BoundingBox,
    pub sphere: BoundingSphere,
}

// ===== RAY QUERY =====

/// Closest-hit ray query, accumulated across meshes and parts
#[derive(Debug, Clone, Copy)]
pub struct RayQuery {
    /// Ray in the space of the mesh being tested
    pub ray: Ray,
    pub compute_normal: bool,
    /// Distance of the closest hit so far (infinite when nothing was hit)
    pub min_distance: f32,
    pub primitive_index: Option<u32>,
    /// Set by the caller when testing the parts of a model
    pub part_index: Option<usize>,
    pub normal: Vec3,
}

impl RayQuery {
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            compute_normal: false,
            min_distance: f32::INFINITY,
            primitive_index: None,
            part_index: None,
            normal: Vec3::ZERO,
        }
    }

    pub fn with_normal(mut self) -> Self {
        self.compute_normal = true;
        self
    }

    pub fn has_hit(&self) -> bool {
        self.primitive_index.is_some()
    }
}

#[derive(Default)]
struct GpuState {
    binding: Option<Arc<dyn VertexBinding>>,
    /// GPU vertex buffer the binding was built on
    bound_buffer: Option<Arc<dyn Buffer>>,
}

// ===== MESH =====

pub struct Mesh {
    vertex_format: VertexFormat,
    primitive: PrimitiveType,
    index_format: Option<IndexFormat>,
    vertex_buffer: SharedRenderBuffer,
    index_buffer: SharedRenderBuffer,
    /// (first, count) of the drawn range; None draws everything
    range: Option<(u32, u32)>,
    dynamic: bool,
    bounds: Mutex<Option<MeshBounds>>,
    gpu: Mutex<GpuState>,
}

impl Mesh {
    /// Create an empty mesh
    ///
    /// # Panics
    ///
    /// Panics if `vertex_format` has no POSITION element.
    pub fn new(
        vertex_format: VertexFormat,
        primitive: PrimitiveType,
        index_format: Option<IndexFormat>,
        dynamic: bool,
    ) -> Self {
        assert!(
            vertex_format.element(VertexUsage::Position).is_some(),
            "Mesh vertex format has no POSITION element"
        );
        Self {
            vertex_format,
            primitive,
            index_format,
            vertex_buffer: RenderBuffer::new(BufferUsage::Vertex, dynamic).shared(),
            index_buffer: RenderBuffer::new(BufferUsage::Index, dynamic).shared(),
            range: None,
            dynamic,
            bounds: Mutex::new(None),
            gpu: Mutex::new(GpuState::default()),
        }
    }

    /// Create a static mesh from packed vertices and optional indices
    pub fn from_data(
        vertex_format: VertexFormat,
        primitive: PrimitiveType,
        vertices: &[u8],
        indices: Option<(IndexFormat, &[u32])>,
    ) -> Self {
        let mut mesh = Self::new(vertex_format, primitive, indices.map(|(f, _)| f), false);
        mesh.set_vertex_data(vertices);
        if let Some((format, indices)) = indices {
            mesh.set_index_data(format, indices);
        }
        mesh
    }

    // ===== ACCESSORS =====

    pub fn vertex_format(&self) -> &VertexFormat {
        &self.vertex_format
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn index_format(&self) -> Option<IndexFormat> {
        self.index_format
    }

    pub fn is_indexed(&self) -> bool {
        self.index_format.is_some()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn vertex_buffer(&self) -> &SharedRenderBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &SharedRenderBuffer {
        &self.index_buffer
    }

    /// Vertices currently stored in the (shared) vertex buffer
    pub fn vertex_count(&self) -> u32 {
        (lock(&self.vertex_buffer).size() / self.stride()) as u32
    }

    /// Indices currently stored in the (shared) index buffer
    pub fn index_count(&self) -> u32 {
        match self.index_format {
            Some(format) => (lock(&self.index_buffer).size() / format.size_bytes() as usize) as u32,
            None => 0,
        }
    }

    /// Explicit part range, if this mesh is a part
    pub fn range(&self) -> Option<(u32, u32)> {
        self.range
    }

    /// (first, count) this mesh draws, in indices or vertices
    pub fn draw_range(&self) -> (u32, u32) {
        match self.range {
            Some(range) => range,
            None if self.is_indexed() => (0, self.index_count()),
            None => (0, self.vertex_count()),
        }
    }

    fn stride(&self) -> usize {
        self.vertex_format.vertex_size() as usize
    }

    // ===== DATA =====

    /// Replace all vertices
    ///
    /// # Panics
    ///
    /// Panics if `vertices` is not a whole number of vertices.
    pub fn set_vertex_data(&mut self, vertices: &[u8]) {
        self.assert_whole_vertices(vertices);
        lock(&self.vertex_buffer).set_data(vertices);
        self.invalidate_bounds();
    }

    /// Replace all indices, making the mesh indexed with `format`
    pub fn set_index_data(&mut self, format: IndexFormat, indices: &[u32]) {
        self.index_format = Some(format);
        lock(&self.index_buffer).set_data_owned(format.pack(indices));
        self.invalidate_bounds();
    }

    /// Drop all vertices and indices, keeping allocations
    pub fn clear(&mut self) {
        lock(&self.vertex_buffer).clear();
        lock(&self.index_buffer).clear();
        self.invalidate_bounds();
    }

    /// A mesh drawing `count` indices (or vertices) from `first`, sharing this
    /// mesh's buffers
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the current index (or vertex) count.
    pub fn create_mesh_part(&self, primitive: PrimitiveType, first: u32, count: u32) -> Mesh {
        let available = if self.is_indexed() { self.index_count() } else { self.vertex_count() };
        assert!(
            first as u64 + count as u64 <= available as u64,
            "Mesh part {}..{} exceeds {} available elements",
            first,
            first + count,
            available
        );
        Mesh {
            vertex_format: self.vertex_format.clone(),
            primitive,
            index_format: self.index_format,
            vertex_buffer: Arc::clone(&self.vertex_buffer),
            index_buffer: Arc::clone(&self.index_buffer),
            range: Some((first, count)),
            dynamic: self.dynamic,
            bounds: Mutex::new(None),
            gpu: Mutex::new(GpuState::default()),
        }
    }

    /// Append a sub-mesh
    ///
    /// New indices are offset by the current vertex count. On triangle
    /// strips the new run is stitched to the previous one with two
    /// degenerate connectors: the previous last index and the old vertex
    /// count (duplicated vertices when not indexed).
    ///
    /// # Panics
    ///
    /// Panics if `indices` presence does not match the mesh's indexed mode, or
    /// `vertices` is not a whole number of vertices.
    pub fn merge(&mut self, vertices: &[u8], indices: Option<&[u32]>) {
        self.assert_whole_vertices(vertices);
        assert_eq!(
            indices.is_some(),
            self.is_indexed(),
            "Mesh::merge index data must match the mesh's indexed mode"
        );

        let stride = self.stride();
        let base = self.vertex_count();
        let strip = self.primitive == PrimitiveType::TriangleStrip;

        match (self.index_format, indices) {
            (Some(format), Some(indices)) => {
                let mut index_buffer = lock(&self.index_buffer);
                let existing = index_buffer.size() / format.size_bytes() as usize;
                let mut packed = Vec::with_capacity((indices.len() + 2) * format.size_bytes() as usize);
                if strip && base > 0 && existing > 0 && !indices.is_empty() {
                    let last = format.read(index_buffer.data(), existing - 1);
                    format.write(&mut packed, last);
                    format.write(&mut packed, base);
                }
                for &index in indices {
                    format.write(&mut packed, index + base);
                }
                index_buffer.add_data(&packed);
                drop(index_buffer);
                lock(&self.vertex_buffer).add_data(vertices);
            }
            _ => {
                let mut vertex_buffer = lock(&self.vertex_buffer);
                if strip && base > 0 && !vertices.is_empty() {
                    let end = vertex_buffer.size();
                    let last = vertex_buffer.data()[end - stride..end].to_vec();
                    vertex_buffer.add_data(&last);
                    vertex_buffer.add_data(&vertices[..stride]);
                }
                vertex_buffer.add_data(vertices);
            }
        }
        self.invalidate_bounds();
    }

    fn assert_whole_vertices(&self, vertices: &[u8]) {
        assert!(
            vertices.len() % self.stride() == 0,
            "Vertex data of {} bytes is not a multiple of the {}-byte vertex size",
            vertices.len(),
            self.stride()
        );
    }

    /// Index (or vertex) numbers of the drawn range
    fn range_indices(&self) -> Vec<u32> {
        let (first, count) = self.draw_range();
        match self.index_format {
            Some(format) => {
                let index_buffer = lock(&self.index_buffer);
                let data = index_buffer.data();
                let available = data.len() / format.size_bytes() as usize;
                (first as usize..(first + count) as usize)
                    .take_while(|&i| i < available)
                    .map(|i| format.read(data, i))
                    .collect()
            }
            None => (first..first + count).collect(),
        }
    }

    /// Decode one vec3-like attribute for every stored vertex (missing
    /// components are zero)
    fn attribute(&self, usage: VertexUsage) -> Option<Vec<Vec3>> {
        let element = self.vertex_format.element(usage)?;
        let offset = self.vertex_format.offset_of(usage)? as usize;
        let components = element.size.min(3) as usize;
        let stride = self.stride();

        let vertex_buffer = lock(&self.vertex_buffer);
        let values = vertex_buffer
            .data()
            .chunks_exact(stride)
            .map(|vertex| {
                let mut value = [0.0f32; 3];
                for (c, slot) in value.iter_mut().enumerate().take(components) {
                    let at = offset + c * 4;
                    *slot = bytemuck::pod_read_unaligned::<f32>(&vertex[at..at + 4]);
                }
                Vec3::from_array(value)
            })
            .collect();
        Some(values)
    }

    // ===== BOUNDS =====

    /// Forget cached bounds (recomputed on next access)
    pub fn invalidate_bounds(&self) {
        *self.bounds_cache() = None;
    }

    pub fn bounds(&self) -> MeshBounds {
        let mut cache = self.bounds_cache();
        if let Some(bounds) = *cache {
            return bounds;
        }
        let bounds = self.compute_bounds();
        *cache = Some(bounds);
        bounds
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounds().bbox
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounds().sphere
    }

    fn bounds_cache(&self) -> MutexGuard<'_, Option<MeshBounds>> {
        self.bounds.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Box from one pass over the drawn vertices, sphere around the box
    /// center with the farthest vertex from a second pass
    fn compute_bounds(&self) -> MeshBounds {
        let Some(positions) = self.attribute(VertexUsage::Position) else {
            return MeshBounds::default();
        };
        let drawn: Vec<Vec3> = self
            .range_indices()
            .into_iter()
            .filter_map(|i| positions.get(i as usize).copied())
            .collect();

        let mut bbox = BoundingBox::empty();
        for &point in &drawn {
            bbox.merge_point(point);
        }
        if bbox.is_empty() {
            return MeshBounds { bbox, sphere: BoundingSphere::default() };
        }

        let center = bbox.center();
        let radius = drawn
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        MeshBounds { bbox, sphere: BoundingSphere::new(center, radius) }
    }

    // ===== DRAW =====

    /// Bring GPU objects up to date and describe a draw of this mesh's range
    ///
    /// # Returns
    ///
    /// None when there is nothing to draw (no vertices, no indices or an empty
    /// range)
    pub fn prepare(&self, renderer: &mut dyn Renderer) -> Result<Option<DrawCommand>> {
        let (rebind, vertex_gpu) = {
            let mut vertex_buffer = lock(&self.vertex_buffer);
            let rebind = vertex_buffer.sync(renderer)?;
            (rebind, vertex_buffer.gpu_buffer().cloned())
        };
        let Some(vertex_gpu) = vertex_gpu else {
            return Ok(None);
        };

        let index_buffer = match self.index_format {
            Some(format) => {
                let mut index_buffer = lock(&self.index_buffer);
                index_buffer.sync(renderer)?;
                match index_buffer.gpu_buffer() {
                    Some(gpu) => Some((Arc::clone(gpu), format)),
                    None => return Ok(None),
                }
            }
            None => None,
        };

        let vertex_binding = {
            let mut gpu = self.gpu.lock().unwrap_or_else(|e| e.into_inner());
            let reusable = match (&gpu.binding, &gpu.bound_buffer) {
                (Some(binding), Some(bound)) if !rebind && Arc::ptr_eq(bound, &vertex_gpu) => {
                    Some(Arc::clone(binding))
                }
                _ => None,
            };
            match reusable {
                Some(binding) => binding,
                None => {
                    let binding = renderer.create_vertex_binding(&self.vertex_format, &vertex_gpu)?;
                    gpu.binding = Some(Arc::clone(&binding));
                    gpu.bound_buffer = Some(Arc::clone(&vertex_gpu));
                    binding
                }
            }
        };

        let (first, count) = self.draw_range();
        if count == 0 {
            return Ok(None);
        }

        Ok(Some(DrawCommand {
            vertex_binding,
            vertex_buffer: vertex_gpu,
            index_buffer,
            primitive: self.primitive,
            first,
            count,
            instance_buffer: None,
            instance_count: 1,
        }))
    }

    /// Emit one draw call per pass of `material`'s chain
    ///
    /// Queued targets honor `first_pass_only` (wireframe, depth passes).
    /// Immediate targets bind and draw every pass right away.
    ///
    /// # Errors
    ///
    /// Returns an error if GPU resources cannot be created or a draw fails.
    pub fn draw(
        &self,
        renderer: &mut dyn Renderer,
        target: DrawTarget<'_>,
        source: &DrawSource,
        material: &Arc<Material>,
    ) -> Result<()> {
        let Some(command) = self.prepare(renderer)? else {
            return Ok(());
        };

        match target {
            DrawTarget::Queue(info) => {
                let first_only = info.first_pass_only();
                for pass in material.passes() {
                    info.draw_calls.push(DrawCall {
                        command: command.clone(),
                        material: Arc::clone(pass),
                        source: source.clone(),
                        distance_to_camera: 0.0,
                    });
                    if first_only {
                        break;
                    }
                }
            }
            DrawTarget::Immediate(frame) => {
                for pass in material.passes() {
                    let call = DrawCall {
                        command: command.clone(),
                        material: Arc::clone(pass),
                        source: source.clone(),
                        distance_to_camera: 0.0,
                    };
                    submit_draw_call(renderer, &call, frame, &SubmitOptions::default())?;
                }
            }
        }
        Ok(())
    }

    // ===== RAYCAST =====

    /// Test `query.ray` (mesh space) against every primitive of the drawn range
    ///
    /// Lines and points are hit within [`PICK_TOLERANCE`].
    ///
    /// # Returns
    ///
    /// true if a hit closer than `query.min_distance` was recorded
    pub fn raycast(&self, query: &mut RayQuery) -> bool {
        let Some(positions) = self.attribute(VertexUsage::Position) else {
            return false;
        };
        let normals = if query.compute_normal {
            self.attribute(VertexUsage::Normal)
        } else {
            None
        };
        let indices = self.range_indices();
        let ray = query.ray;
        let position = |i: u32| positions.get(i as usize).copied();
        let mut hit = false;

        let mut record = |distance: f32, primitive: u32, normal: Vec3, query: &mut RayQuery| {
            if distance < query.min_distance {
                query.min_distance = distance;
                query.primitive_index = Some(primitive);
                if query.compute_normal {
                    query.normal = normal;
                }
                hit = true;
            }
        };

        match self.primitive {
            PrimitiveType::Triangles | PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => {
                for (primitive, [i0, i1, i2]) in triangles(self.primitive, &indices) {
                    let (Some(a), Some(b), Some(c)) = (position(i0), position(i1), position(i2)) else {
                        continue;
                    };
                    let Some(tri) = ray.intersects_triangle(a, b, c) else {
                        continue;
                    };
                    let normal = match &normals {
                        Some(normals) => {
                            let n = |i: u32| normals.get(i as usize).copied().unwrap_or(Vec3::ZERO);
                            (n(i0) * (1.0 - tri.u - tri.v) + n(i1) * tri.u + n(i2) * tri.v)
                                .normalize_or_zero()
                        }
                        None => (b - a).cross(c - a).normalize_or_zero(),
                    };
                    record(tri.distance, primitive, normal, query);
                }
            }
            PrimitiveType::Lines | PrimitiveType::LineStrip => {
                let segments: Vec<(u32, [u32; 2])> = if self.primitive == PrimitiveType::Lines {
                    indices.chunks_exact(2).enumerate().map(|(p, s)| (p as u32, [s[0], s[1]])).collect()
                } else {
                    indices.windows(2).enumerate().map(|(p, s)| (p as u32, [s[0], s[1]])).collect()
                };
                for (primitive, [i0, i1]) in segments {
                    let (Some(a), Some(b)) = (position(i0), position(i1)) else {
                        continue;
                    };
                    if let Some(distance) = ray.intersects_segment(a, b, PICK_TOLERANCE) {
                        record(distance, primitive, -ray.direction, query);
                    }
                }
            }
            PrimitiveType::Points => {
                for (primitive, &i) in indices.iter().enumerate() {
                    let Some(point) = position(i) else {
                        continue;
                    };
                    if let Some(distance) = ray.intersects_point(point, PICK_TOLERANCE) {
                        record(distance, primitive as u32, -ray.direction, query);
                    }
                }
            }
        }
        hit
    }

    // ===== SERIALIZATION =====

    /// Write the mesh in the binary mesh layout (little-endian, unversioned)
    ///
    /// Field order: element count, (usage, size) per element, dynamic flag,
    /// vertex byte count + bytes, index format (0 = none), index byte count +
    /// bytes, primitive, range first, range count (0 = whole buffer), then box
    /// min, box max, sphere center and sphere radius.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bounds = self.bounds();

        write_u32(writer, self.vertex_format.elements().len() as u32)?;
        for element in self.vertex_format.elements() {
            write_u32(writer, element.usage as u32)?;
            write_u32(writer, element.size)?;
        }
        writer.write_all(&[self.dynamic as u8])?;

        write_bytes(writer, lock(&self.vertex_buffer).data())?;
        write_u32(writer, self.index_format.map_or(0, |f| f as u32))?;
        write_bytes(writer, lock(&self.index_buffer).data())?;

        write_u32(writer, self.primitive as u32)?;
        let (first, count) = self.range.unwrap_or((0, 0));
        write_u32(writer, first)?;
        write_u32(writer, count)?;

        let floats = [
            bounds.bbox.min.x, bounds.bbox.min.y, bounds.bbox.min.z,
            bounds.bbox.max.x, bounds.bbox.max.y, bounds.bbox.max.z,
            bounds.sphere.center.x, bounds.sphere.center.y, bounds.sphere.center.z,
            bounds.sphere.radius,
        ];
        for value in floats {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a mesh written by [`Mesh::write`]
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFormat` for truncated streams, unknown enum
    /// values, inconsistent lengths or a format without POSITION, and
    /// `Error::Io` for other read failures.
    pub fn read<R: Read>(reader: &mut R) -> Result<Mesh> {
        let element_count = read_u32(reader)?;
        if element_count == 0 || element_count > MAX_STREAM_ELEMENTS {
            return Err(invalid(format!("vertex element count {} out of range", element_count)));
        }
        let mut elements = Vec::with_capacity(element_count as usize);
        for _ in 0..element_count {
            let raw_usage = read_u32(reader)?;
            let usage = VertexUsage::from_u32(raw_usage)
                .ok_or_else(|| invalid(format!("unknown vertex usage {}", raw_usage)))?;
            elements.push(VertexElement::new(usage, read_u32(reader)?));
        }
        let vertex_format = VertexFormat::new(elements).map_err(|e| invalid(e.to_string()))?;
        if vertex_format.element(VertexUsage::Position).is_none() {
            return Err(invalid("vertex format has no POSITION element".to_string()));
        }

        let mut flag = [0u8; 1];
        read_exact(reader, &mut flag)?;
        let dynamic = flag[0] != 0;

        let vertices = read_bytes(reader)?;
        if vertices.len() % vertex_format.vertex_size() as usize != 0 {
            return Err(invalid(format!(
                "{} vertex bytes is not a multiple of the {}-byte vertex size",
                vertices.len(),
                vertex_format.vertex_size()
            )));
        }

        let raw_index_format = read_u32(reader)?;
        let index_format = match raw_index_format {
            0 => None,
            raw => Some(
                IndexFormat::from_u32(raw)
                    .ok_or_else(|| invalid(format!("unknown index format {}", raw)))?,
            ),
        };
        let indices = read_bytes(reader)?;
        match index_format {
            Some(format) if indices.len() % format.size_bytes() as usize != 0 => {
                return Err(invalid(format!("{} index bytes do not fit {:?}", indices.len(), format)));
            }
            None if !indices.is_empty() => {
                return Err(invalid("index bytes present without an index format".to_string()));
            }
            _ => {}
        }

        let raw_primitive = read_u32(reader)?;
        let primitive = PrimitiveType::from_u32(raw_primitive)
            .ok_or_else(|| invalid(format!("unknown primitive type {}", raw_primitive)))?;
        let first = read_u32(reader)?;
        let count = read_u32(reader)?;

        let mut floats = [0.0f32; 10];
        for value in floats.iter_mut() {
            let mut bytes = [0u8; 4];
            read_exact(reader, &mut bytes)?;
            *value = f32::from_le_bytes(bytes);
        }

        let mut mesh = Mesh::new(vertex_format, primitive, index_format, dynamic);
        lock(&mesh.vertex_buffer).set_data_owned(vertices);
        lock(&mesh.index_buffer).set_data_owned(indices);

        if count > 0 {
            let available = if mesh.is_indexed() { mesh.index_count() } else { mesh.vertex_count() };
            if first as u64 + count as u64 > available as u64 {
                return Err(invalid(format!(
                    "range {}..{} exceeds {} elements",
                    first,
                    first as u64 + count as u64,
                    available
                )));
            }
            mesh.range = Some((first, count));
        }

        *mesh.bounds_cache() = Some(MeshBounds {
            bbox: BoundingBox::new(
                Vec3::new(floats[0], floats[1], floats[2]),
                Vec3::new(floats[3], floats[4], floats[5]),
            ),
            sphere: BoundingSphere::new(Vec3::new(floats[6], floats[7], floats[8]), floats[9]),
        });
        Ok(mesh)
    }

    // ===== FACTORIES =====

    /// Quad of `width` x `height` centered on the origin in the XY plane,
    /// facing +Z (position, normal, texcoord; triangle strip)
    pub fn create_quad(width: f32, height: f32) -> Mesh {
        let (x, y) = (width * 0.5, height * 0.5);
        #[rustfmt::skip]
        let vertices: [f32; 32] = [
            -x,  y, 0.0,  0.0, 0.0, 1.0,  0.0, 1.0,
            -x, -y, 0.0,  0.0, 0.0, 1.0,  0.0, 0.0,
             x,  y, 0.0,  0.0, 0.0, 1.0,  1.0, 1.0,
             x, -y, 0.0,  0.0, 0.0, 1.0,  1.0, 0.0,
        ];
        let format = fixed_format(&[
            (VertexUsage::Position, 3),
            (VertexUsage::Normal, 3),
            (VertexUsage::TexCoord0, 2),
        ]);
        Mesh::from_data(format, PrimitiveType::TriangleStrip, bytemuck::cast_slice(&vertices), None)
    }

    /// Quad covering clip space (position, texcoord; triangle strip)
    pub fn create_full_screen_quad() -> Mesh {
        #[rustfmt::skip]
        let vertices: [f32; 20] = [
            -1.0,  1.0, 0.0,  0.0, 1.0,
            -1.0, -1.0, 0.0,  0.0, 0.0,
             1.0,  1.0, 0.0,  1.0, 1.0,
             1.0, -1.0, 0.0,  1.0, 0.0,
        ];
        let format = fixed_format(&[(VertexUsage::Position, 3), (VertexUsage::TexCoord0, 2)]);
        Mesh::from_data(format, PrimitiveType::TriangleStrip, bytemuck::cast_slice(&vertices), None)
    }

    /// Line list from pairs of points
    pub fn create_lines(points: &[Vec3]) -> Mesh {
        let floats: Vec<f32> = points.iter().flat_map(|p| p.to_array()).collect();
        let format = fixed_format(&[(VertexUsage::Position, 3)]);
        Mesh::from_data(format, PrimitiveType::Lines, bytemuck::cast_slice(&floats), None)
    }

    /// Wireframe of `bbox`: its 8 corners and 12 edges (indexed lines)
    pub fn create_bounding_box(bbox: &BoundingBox) -> Mesh {
        let floats: Vec<f32> = bbox.corners().iter().flat_map(|p| p.to_array()).collect();
        let mut indices = Vec::with_capacity(24);
        for corner in 0u32..8 {
            for axis in [1u32, 2, 4] {
                if corner & axis == 0 {
                    indices.push(corner);
                    indices.push(corner | axis);
                }
            }
        }
        let format = fixed_format(&[(VertexUsage::Position, 3)]);
        Mesh::from_data(
            format,
            PrimitiveType::Lines,
            bytemuck::cast_slice(&floats),
            Some((IndexFormat::U8, &indices)),
        )
    }
}

/// Triangles of a triangle-list/strip/fan index run, with their primitive
/// index; degenerate strip triangles are skipped
fn triangles(primitive: PrimitiveType, indices: &[u32]) -> Vec<(u32, [u32; 3])> {
    match primitive {
        PrimitiveType::Triangles => indices
            .chunks_exact(3)
            .enumerate()
            .map(|(p, t)| (p as u32, [t[0], t[1], t[2]]))
            .collect(),
        PrimitiveType::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .filter(|(_, t)| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
            .map(|(p, t)| (p as u32, [t[0], t[1], t[2]]))
            .collect(),
        PrimitiveType::TriangleFan if indices.len() >= 3 => (1..indices.len() - 1)
            .map(|i| ((i - 1) as u32, [indices[0], indices[i], indices[i + 1]]))
            .collect(),
        _ => Vec::new(),
    }
}

fn fixed_format(elements: &[(VertexUsage, u32)]) -> VertexFormat {
    let elements = elements.iter().map(|&(usage, size)| VertexElement::new(usage, size)).collect();
    match VertexFormat::new(elements) {
        Ok(format) => format,
        Err(e) => panic!("built-in vertex format rejected: {}", e),
    }
}

// ===== STREAM HELPERS =====

fn invalid(message: String) -> Error {
    crate::engine_error!("nova3d::Mesh", "Invalid mesh stream: {}", message);
    Error::InvalidFormat(message)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => invalid("truncated stream".to_string()),
        _ => Error::from(e),
    })
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    let mut bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(invalid(format!("expected {} bytes, stream ended after {}", len, bytes.len())));
    }
    Ok(bytes)
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    write_u32(writer, bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
