/// Mock Renderer for unit tests (no GPU required)
///
/// Records every command into a shared [`MockLog`] so tests can hand the renderer
/// to a `RenderPath` (as `Arc<Mutex<dyn Renderer>>`) and still inspect what was
/// issued afterwards.

use std::sync::{Arc, Mutex};

use crate::engine_bail;
use crate::error::Result;
use crate::renderer::{
    Buffer, BufferDesc, BufferUsage, ClearFlags, CompareOp, DrawCommand, FrameBuffer,
    FrameBufferDesc, PrimitiveType, Renderer, RendererStats, ShaderProgram, ShaderProgramDesc,
    StateBlock, Texture, TextureDesc, TextureInfo, TextureUsage, UniformValue, VertexBinding,
    VertexFormat, VertexUsage, Viewport,
};

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub usage: BufferUsage,
    pub data: Mutex<Vec<u8>>,
    log: Arc<Mutex<MockLog>>,
}

impl MockBuffer {
    pub fn new(size: u64, usage: BufferUsage, log: Arc<Mutex<MockLog>>) -> Self {
        Self {
            usage,
            data: Mutex::new(vec![0; size as usize]),
            log,
        }
    }
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut storage = self.data.lock().unwrap();
        let end = offset as usize + data.len();
        if end > storage.len() {
            engine_bail!("nova3d::mock",
                "Buffer update out of range ({} > {})", end, storage.len());
        }
        storage[offset as usize..end].copy_from_slice(data);
        self.log.lock().unwrap().buffer_updates += 1;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
    pub name: String,
}

impl MockTexture {
    pub fn new(info: TextureInfo, name: String) -> Self {
        Self { info, name }
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

// ============================================================================
// Mock Shader Program
// ============================================================================

#[derive(Debug)]
pub struct MockShaderProgram {
    pub label: String,
}

impl ShaderProgram for MockShaderProgram {
    fn label(&self) -> &str {
        &self.label
    }
}

// ============================================================================
// Mock Vertex Binding
// ============================================================================

#[derive(Debug)]
pub struct MockVertexBinding {
    pub stride: u32,
}

impl VertexBinding for MockVertexBinding {
    fn stride(&self) -> u32 {
        self.stride
    }
}

// ============================================================================
// Mock Frame Buffer
// ============================================================================

pub struct MockFrameBuffer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<Arc<dyn Texture>>,
    pub depth: Option<Arc<dyn Texture>>,
}

impl FrameBuffer for MockFrameBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn color_attachment_count(&self) -> usize {
        self.colors.len()
    }

    fn color_attachment(&self, index: usize) -> Option<Arc<dyn Texture>> {
        self.colors.get(index).cloned()
    }

    fn depth_attachment(&self) -> Option<Arc<dyn Texture>> {
        self.depth.clone()
    }
}

// ============================================================================
// Mock Log
// ============================================================================

/// A draw as seen by the mock renderer
#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub program: String,
    pub primitive: PrimitiveType,
    pub first: u32,
    pub count: u32,
    pub indexed: bool,
    pub instance_count: u32,
    /// Bound frame buffer name ("screen" for the default one)
    pub target: String,
    pub depth_write: bool,
    pub depth_func: CompareOp,
}

/// Everything the mock renderer observed
#[derive(Debug, Default)]
pub struct MockLog {
    pub commands: Vec<String>,
    pub draws: Vec<RecordedDraw>,
    /// (program label, uniform name, value debug string)
    pub uniforms: Vec<(String, String, String)>,
    pub created_buffers: usize,
    /// Successful `Buffer::update` calls across all buffers
    pub buffer_updates: usize,
    pub created_textures: usize,
    pub created_programs: usize,
    pub created_bindings: usize,
    pub created_frame_buffers: Vec<String>,
    pub window_size: (u32, u32),
}

impl MockLog {
    /// Commands starting with `prefix`
    pub fn commands_with(&self, prefix: &str) -> Vec<String> {
        self.commands.iter().filter(|c| c.starts_with(prefix)).cloned().collect()
    }

    /// Last value written to uniform `name`, if any
    pub fn last_uniform(&self, name: &str) -> Option<String> {
        self.uniforms.iter().rev().find(|(_, n, _)| n == name).map(|(_, _, v)| v.clone())
    }
}

// ============================================================================
// Mock Renderer
// ============================================================================

/// Mock Renderer that records commands without a GPU
pub struct MockRenderer {
    log: Arc<Mutex<MockLog>>,
    bound_frame_buffer: Option<Arc<dyn FrameBuffer>>,
    bound_program: Option<String>,
    state: StateBlock,
    missing_uniforms: Vec<String>,
    failing_programs: Vec<String>,
    failing_bindings: Vec<VertexUsage>,
    stats: RendererStats,
}

impl MockRenderer {
    /// Create a new mock renderer with an 800x600 window
    pub fn new() -> Self {
        let log = MockLog { window_size: (800, 600), ..Default::default() };
        Self {
            log: Arc::new(Mutex::new(log)),
            bound_frame_buffer: None,
            bound_program: None,
            state: StateBlock::default(),
            missing_uniforms: Vec::new(),
            failing_programs: Vec::new(),
            failing_bindings: Vec::new(),
            stats: RendererStats::default(),
        }
    }

    /// Shared handle on the command log (also controls the window size)
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.log.clone()
    }

    /// Report `name` as an unknown uniform in every program
    pub fn with_missing_uniform(mut self, name: &str) -> Self {
        self.missing_uniforms.push(name.to_string());
        self
    }

    /// Fail program creation when vertex or fragment source contains `pattern`
    pub fn with_failing_program(mut self, pattern: &str) -> Self {
        self.failing_programs.push(pattern.to_string());
        self
    }

    /// Fail vertex binding creation for formats carrying a `usage` element
    pub fn with_failing_binding(mut self, usage: VertexUsage) -> Self {
        self.failing_bindings.push(usage);
        self
    }

    /// Wrap into the shared handle used by RenderPath
    pub fn into_shared(self) -> Arc<Mutex<dyn Renderer>> {
        Arc::new(Mutex::new(self))
    }

    fn push(&self, command: String) {
        self.log.lock().unwrap().commands.push(command);
    }

    fn target_name(&self) -> String {
        self.bound_frame_buffer
            .as_ref()
            .map(|fb| fb.name().to_string())
            .unwrap_or_else(|| "screen".to_string())
    }
}

impl Renderer for MockRenderer {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.log.lock().unwrap().created_buffers += 1;
        Ok(Arc::new(MockBuffer::new(desc.size, desc.usage, self.log.clone())))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        self.log.lock().unwrap().created_textures += 1;
        let info = TextureInfo {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
        };
        let name = format!("texture_{}x{}", desc.width, desc.height);
        Ok(Arc::new(MockTexture::new(info, name)))
    }

    fn create_shader_program(&mut self, desc: &ShaderProgramDesc) -> Result<Arc<dyn ShaderProgram>> {
        if let Some(pattern) = self
            .failing_programs
            .iter()
            .find(|p| desc.vertex.contains(p.as_str()) || desc.fragment.contains(p.as_str()))
        {
            engine_bail!("nova3d::mock", "Failed to link program matching '{}'", pattern);
        }
        self.log.lock().unwrap().created_programs += 1;
        let label = format!("{}|{}|{}", desc.vertex, desc.fragment, desc.defines);
        Ok(Arc::new(MockShaderProgram { label }))
    }

    fn create_vertex_binding(
        &mut self,
        format: &VertexFormat,
        _vertex_buffer: &Arc<dyn Buffer>,
    ) -> Result<Arc<dyn VertexBinding>> {
        if let Some(usage) = self.failing_bindings.iter().find(|u| format.element(**u).is_some()) {
            engine_bail!("nova3d::mock", "Vertex binding rejected for {:?} element", usage);
        }
        self.log.lock().unwrap().created_bindings += 1;
        Ok(Arc::new(MockVertexBinding { stride: format.vertex_size() }))
    }

    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<Arc<dyn FrameBuffer>> {
        let mut colors: Vec<Arc<dyn Texture>> = Vec::new();
        for format in &desc.color_formats {
            let info = TextureInfo {
                width: desc.width,
                height: desc.height,
                format: *format,
                usage: TextureUsage::SampledAndRenderTarget,
            };
            colors.push(Arc::new(MockTexture::new(info, format!("{}.color", desc.name))));
        }
        let depth = desc.depth_format.map(|format| {
            let info = TextureInfo {
                width: desc.width,
                height: desc.height,
                format,
                usage: TextureUsage::DepthStencil,
            };
            Arc::new(MockTexture::new(info, format!("{}.depth", desc.name))) as Arc<dyn Texture>
        });
        self.log.lock().unwrap().created_frame_buffers.push(desc.name.clone());
        Ok(Arc::new(MockFrameBuffer {
            name: desc.name.clone(),
            width: desc.width,
            height: desc.height,
            colors,
            depth,
        }))
    }

    fn bind_frame_buffer(
        &mut self,
        frame_buffer: Option<Arc<dyn FrameBuffer>>,
    ) -> Option<Arc<dyn FrameBuffer>> {
        let previous = std::mem::replace(&mut self.bound_frame_buffer, frame_buffer);
        self.stats.frame_buffer_binds += 1;
        let name = self.target_name();
        self.push(format!("bind_frame_buffer:{}", name));
        previous
    }

    fn current_frame_buffer(&self) -> Option<Arc<dyn FrameBuffer>> {
        self.bound_frame_buffer.clone()
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.push(format!(
            "set_viewport:{},{},{},{}",
            viewport.x, viewport.y, viewport.width, viewport.height
        ));
    }

    fn clear(&mut self, flags: ClearFlags, _color: [f32; 4], _depth: f32, _stencil: u32) {
        self.push(format!("clear:{:?}", flags));
    }

    fn apply_state(&mut self, state: &StateBlock) {
        self.state = *state;
        self.push("apply_state".to_string());
    }

    fn bind_program(&mut self, program: &Arc<dyn ShaderProgram>) {
        self.bound_program = Some(program.label().to_string());
        self.push(format!("bind_program:{}", program.label()));
    }

    fn set_uniform(
        &mut self,
        program: &Arc<dyn ShaderProgram>,
        name: &str,
        value: &UniformValue,
    ) -> bool {
        if self.missing_uniforms.iter().any(|m| m == name) {
            return false;
        }
        self.log.lock().unwrap().uniforms.push((
            program.label().to_string(),
            name.to_string(),
            format!("{:?}", value),
        ));
        true
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<()> {
        let program = match &self.bound_program {
            Some(label) => label.clone(),
            None => engine_bail!("nova3d::mock", "Draw without a bound program"),
        };
        self.stats.draw_calls += 1;
        if command.is_instanced() {
            self.stats.instanced_draw_calls += 1;
        }
        let draw = RecordedDraw {
            program: program.clone(),
            primitive: command.primitive,
            first: command.first,
            count: command.count,
            indexed: command.is_indexed(),
            instance_count: command.instance_count,
            target: self.target_name(),
            depth_write: self.state.depth_write,
            depth_func: self.state.depth_func,
        };
        let mut log = self.log.lock().unwrap();
        log.commands.push(format!("draw:{}:{}x{}", program, command.count, command.instance_count));
        log.draws.push(draw);
        Ok(())
    }

    fn window_size(&self) -> (u32, u32) {
        self.log.lock().unwrap().window_size
    }

    fn stats(&self) -> RendererStats {
        self.stats
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_renderer_tests.rs"]
mod tests;
