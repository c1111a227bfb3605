/// Cache of linked shader programs keyed by (vertex, fragment, defines).
///
/// Entries are weak: a program lives as long as some material holds it, and
/// the next request after that recompiles it.

use std::sync::{Arc, Weak};
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::renderer::{Renderer, ShaderProgram, ShaderProgramDesc};

#[derive(Default)]
pub struct ShaderCache {
    programs: FxHashMap<ShaderProgramDesc, Weak<dyn ShaderProgram>>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live program for `desc`, compiling it on a miss
    ///
    /// # Errors
    ///
    /// Returns the renderer's error if compilation or linking fails. Nothing
    /// is cached in that case.
    pub fn program(
        &mut self,
        renderer: &mut dyn Renderer,
        desc: &ShaderProgramDesc,
    ) -> Result<Arc<dyn ShaderProgram>> {
        if let Some(program) = self.programs.get(desc).and_then(Weak::upgrade) {
            return Ok(program);
        }

        let program = renderer.create_shader_program(desc)?;
        crate::engine_debug!("nova3d::ShaderCache",
            "Compiled program '{}' ('{}' / '{}')", program.label(), desc.vertex, desc.fragment);
        self.programs.insert(desc.clone(), Arc::downgrade(&program));
        Ok(program)
    }

    /// Drop entries whose program is no longer referenced
    pub fn purge(&mut self) -> usize {
        let before = self.programs.len();
        self.programs.retain(|_, program| program.strong_count() > 0);
        before - self.programs.len()
    }

    /// Number of cached entries (live or not yet purged)
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
#[path = "shader_cache_tests.rs"]
mod tests;
