/// Materials: a shader program, its parameters and its render state.
///
/// A Material binds a linked [`ShaderProgram`] with named parameters and a
/// [`StateBlock`]. Parameters are either explicit uniform values or
/// auto-bindings resolved per draw from the frame (camera, shadows, lights) and
/// the drawable (world matrix, skin palette).
///
/// Materials may chain additional passes through `next_pass`; a mesh draws
/// once per pass, in chain order.
///
/// Materials are shared as `Arc<Material>`. Parameters and state use interior
/// locks so render passes can bind input textures and apply scoped depth
/// overrides through a shared handle.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::renderer::{Renderer, ShaderProgram, ShaderProgramDesc, StateBlock, UniformValue};
use crate::resource::mesh_skin::MeshSkin;
use crate::resource::shader_cache::ShaderCache;
use crate::render::frame_params::FrameParams;

static NEXT_MATERIAL_ID: AtomicU32 = AtomicU32::new(1);

// ===== AUTO BINDINGS =====

/// Values resolved automatically at bind time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoBinding {
    World,
    View,
    Projection,
    WorldView,
    ViewProjection,
    WorldViewProjection,
    InverseTransposeWorld,
    InverseTransposeWorldView,
    CameraWorldPosition,
    CameraViewPosition,
    /// Skinning joint matrices (empty binding when the drawable has no skin)
    MatrixPalette,
    ShadowMatrices,
    ShadowCascadeDistances,
    ShadowMaps,
    DirectionalLightDirections,
    DirectionalLightColors,
    PointLightPositions,
    PointLightColors,
    PointLightRanges,
}

impl AutoBinding {
    /// Parse the upper-case binding name used in material descriptions
    /// (`"WORLD_VIEW_PROJECTION_MATRIX"`, `"CAMERA_WORLD_POSITION"`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let binding = match name {
            "WORLD_MATRIX" => AutoBinding::World,
            "VIEW_MATRIX" => AutoBinding::View,
            "PROJECTION_MATRIX" => AutoBinding::Projection,
            "WORLD_VIEW_MATRIX" => AutoBinding::WorldView,
            "VIEW_PROJECTION_MATRIX" => AutoBinding::ViewProjection,
            "WORLD_VIEW_PROJECTION_MATRIX" => AutoBinding::WorldViewProjection,
            "INVERSE_TRANSPOSE_WORLD_MATRIX" => AutoBinding::InverseTransposeWorld,
            "INVERSE_TRANSPOSE_WORLD_VIEW_MATRIX" => AutoBinding::InverseTransposeWorldView,
            "CAMERA_WORLD_POSITION" => AutoBinding::CameraWorldPosition,
            "CAMERA_VIEW_POSITION" => AutoBinding::CameraViewPosition,
            "MATRIX_PALETTE" => AutoBinding::MatrixPalette,
            "SHADOW_MATRICES" => AutoBinding::ShadowMatrices,
            "SHADOW_CASCADE_DISTANCES" => AutoBinding::ShadowCascadeDistances,
            "SHADOW_MAPS" => AutoBinding::ShadowMaps,
            "DIRECTIONAL_LIGHT_DIRECTIONS" => AutoBinding::DirectionalLightDirections,
            "DIRECTIONAL_LIGHT_COLORS" => AutoBinding::DirectionalLightColors,
            "POINT_LIGHT_POSITIONS" => AutoBinding::PointLightPositions,
            "POINT_LIGHT_COLORS" => AutoBinding::PointLightColors,
            "POINT_LIGHT_RANGES" => AutoBinding::PointLightRanges,
            _ => return None,
        };
        Some(binding)
    }

    /// Resolve to a uniform value; None when the frame has nothing to bind
    /// (no shadows, no lights, no skin)
    pub fn resolve(
        &self,
        frame: &FrameParams,
        world: &Mat4,
        skin: Option<&MeshSkin>,
    ) -> Option<UniformValue> {
        let value = match self {
            AutoBinding::World => UniformValue::Mat4(*world),
            AutoBinding::View => UniformValue::Mat4(frame.view),
            AutoBinding::Projection => UniformValue::Mat4(frame.projection),
            AutoBinding::WorldView => UniformValue::Mat4(frame.view * *world),
            AutoBinding::ViewProjection => UniformValue::Mat4(frame.view_projection),
            AutoBinding::WorldViewProjection => UniformValue::Mat4(frame.view_projection * *world),
            AutoBinding::InverseTransposeWorld => {
                UniformValue::Mat4(world.inverse().transpose())
            }
            AutoBinding::InverseTransposeWorldView => {
                UniformValue::Mat4((frame.view * *world).inverse().transpose())
            }
            AutoBinding::CameraWorldPosition => UniformValue::Vec3(frame.camera_position),
            AutoBinding::CameraViewPosition => {
                UniformValue::Vec3(frame.view.transform_point3(frame.camera_position))
            }
            AutoBinding::MatrixPalette => UniformValue::Mat4Array(skin?.matrix_palette()),
            AutoBinding::ShadowMatrices => non_empty(&frame.shadow_matrices, UniformValue::Mat4Array)?,
            AutoBinding::ShadowCascadeDistances => {
                non_empty(&frame.cascade_distances, UniformValue::FloatArray)?
            }
            AutoBinding::ShadowMaps => non_empty(&frame.shadow_maps, UniformValue::SamplerArray)?,
            AutoBinding::DirectionalLightDirections => {
                non_empty(&frame.lights.directional_directions, UniformValue::Vec3Array)?
            }
            AutoBinding::DirectionalLightColors => {
                non_empty(&frame.lights.directional_colors, UniformValue::Vec3Array)?
            }
            AutoBinding::PointLightPositions => {
                non_empty(&frame.lights.point_positions, UniformValue::Vec3Array)?
            }
            AutoBinding::PointLightColors => {
                non_empty(&frame.lights.point_colors, UniformValue::Vec3Array)?
            }
            AutoBinding::PointLightRanges => {
                non_empty(&frame.lights.point_ranges, UniformValue::FloatArray)?
            }
        };
        Some(value)
    }
}

fn non_empty<T: Clone>(values: &[T], wrap: fn(Vec<T>) -> UniformValue) -> Option<UniformValue> {
    if values.is_empty() {
        None
    } else {
        Some(wrap(values.to_vec()))
    }
}

// ===== PARAMETERS =====

/// What a material parameter binds
#[derive(Debug, Clone)]
pub enum MaterialBinding {
    Value(UniformValue),
    Auto(AutoBinding),
}

struct MaterialParameter {
    name: String,
    binding: MaterialBinding,
    /// Set once the "uniform not found" warning has been emitted
    missing_logged: AtomicBool,
}

#[derive(Default)]
struct MaterialParams {
    entries: Vec<MaterialParameter>,
    names: FxHashMap<String, usize>,
}

impl MaterialParams {
    fn set(&mut self, name: &str, binding: MaterialBinding) {
        match self.names.get(name) {
            Some(&index) => {
                let entry = &mut self.entries[index];
                entry.binding = binding;
                entry.missing_logged.store(false, Ordering::Relaxed);
            }
            None => {
                self.names.insert(name.to_string(), self.entries.len());
                self.entries.push(MaterialParameter {
                    name: name.to_string(),
                    binding,
                    missing_logged: AtomicBool::new(false),
                });
            }
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        let Some(index) = self.names.remove(name) else {
            return false;
        };
        self.entries.remove(index);
        for slot in self.names.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        true
    }
}

// ===== MATERIAL =====

/// Shader program + parameters + render state (+ optional next pass)
pub struct Material {
    id: u32,
    name: String,
    program: Arc<dyn ShaderProgram>,
    state: RwLock<StateBlock>,
    params: RwLock<MaterialParams>,
    next_pass: Option<Arc<Material>>,
}

impl Material {
    /// Create a material around an already linked program
    pub fn new(name: &str, program: Arc<dyn ShaderProgram>) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            program,
            state: RwLock::new(StateBlock::default()),
            params: RwLock::new(MaterialParams::default()),
            next_pass: None,
        }
    }

    /// Create a material, compiling (or reusing) its program through `cache`
    ///
    /// # Errors
    ///
    /// Returns an error if the program fails to compile or link.
    pub fn from_shaders(
        name: &str,
        renderer: &mut dyn Renderer,
        cache: &mut ShaderCache,
        desc: &ShaderProgramDesc,
    ) -> Result<Self> {
        let program = cache.program(renderer, desc)?;
        Ok(Self::new(name, program))
    }

    /// Chain a pass drawn after this one
    pub fn with_next_pass(mut self, next: Arc<Material>) -> Self {
        self.next_pass = Some(next);
        self
    }

    pub fn with_state(self, state: StateBlock) -> Self {
        *self.state_write() = state;
        self
    }

    // ===== ACCESSORS =====

    /// Process-unique, sequentially assigned identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Arc<dyn ShaderProgram> {
        &self.program
    }

    pub fn next_pass(&self) -> Option<&Arc<Material>> {
        self.next_pass.as_ref()
    }

    /// This material followed by its chained passes
    pub fn passes(self: &Arc<Self>) -> MaterialPasses<'_> {
        MaterialPasses { next: Some(self) }
    }

    // ===== STATE =====

    pub fn state(&self) -> StateBlock {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_state(&self, state: StateBlock) {
        *self.state_write() = state;
    }

    /// Set one state from its textual name/value pair
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFormat` for an unknown name or value.
    pub fn set_state_value(&self, name: &str, value: &str) -> Result<()> {
        self.state_write().set_state(name, value)
    }

    fn state_write(&self) -> RwLockWriteGuard<'_, StateBlock> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ===== PARAMETERS =====

    /// Set (or replace) an explicit parameter value
    pub fn set_parameter(&self, name: &str, value: UniformValue) {
        self.params_write().set(name, MaterialBinding::Value(value));
    }

    /// Bind a parameter to an automatically resolved value
    pub fn set_auto_binding(&self, name: &str, binding: AutoBinding) {
        self.params_write().set(name, MaterialBinding::Auto(binding));
    }

    pub fn parameter(&self, name: &str) -> Option<MaterialBinding> {
        let params = self.params_read();
        let index = *params.names.get(name)?;
        Some(params.entries[index].binding.clone())
    }

    pub fn remove_parameter(&self, name: &str) -> bool {
        self.params_write().remove(name)
    }

    pub fn parameter_count(&self) -> usize {
        self.params_read().entries.len()
    }

    fn params_read(&self) -> RwLockReadGuard<'_, MaterialParams> {
        self.params.read().unwrap_or_else(|e| e.into_inner())
    }

    fn params_write(&self) -> RwLockWriteGuard<'_, MaterialParams> {
        self.params.write().unwrap_or_else(|e| e.into_inner())
    }

    // ===== BINDING =====

    /// Bind program, parameters and state for one draw
    ///
    /// Auto-bindings with nothing to bind are skipped. A parameter the program
    /// does not declare is reported once, then silently skipped.
    pub fn bind(
        &self,
        renderer: &mut dyn Renderer,
        frame: &FrameParams,
        world: &Mat4,
        skin: Option<&MeshSkin>,
    ) {
        renderer.bind_program(&self.program);

        let params = self.params_read();
        for param in &params.entries {
            let resolved;
            let value = match &param.binding {
                MaterialBinding::Value(value) => value,
                MaterialBinding::Auto(auto) => match auto.resolve(frame, world, skin) {
                    Some(value) => {
                        resolved = value;
                        &resolved
                    }
                    None => continue,
                },
            };
            if !renderer.set_uniform(&self.program, &param.name, value)
                && !param.missing_logged.swap(true, Ordering::Relaxed)
            {
                crate::engine_warn!("nova3d::Material",
                    "Material '{}': uniform '{}' ({}) not found in program '{}'",
                    self.name, param.name, value.type_name(), self.program.label());
            }
        }
        drop(params);

        renderer.apply_state(&self.state());
    }
}

/// Iterator over a material and its chained passes
pub struct MaterialPasses<'a> {
    next: Option<&'a Arc<Material>>,
}

impl<'a> Iterator for MaterialPasses<'a> {
    type Item = &'a Arc<Material>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next_pass.as_ref();
        Some(current)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
