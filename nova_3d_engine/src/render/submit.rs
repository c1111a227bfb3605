/// Draw call submission: material binding, state overrides and the draw itself.

use std::sync::Arc;

use crate::error::Result;
use crate::renderer::{CompareOp, Renderer, StateBlock};
use crate::render::draw_call::DrawCall;
use crate::render::frame_params::FrameParams;
use crate::resource::Material;

/// Per-pass adjustments applied while submitting draw calls
#[derive(Default, Clone, Copy)]
pub struct SubmitOptions<'a> {
    /// Bound instead of each call's own material
    pub override_material: Option<&'a Arc<Material>>,
    /// Depth test EQUAL with depth writes off, to reuse a depth pre-pass
    pub depth_equal: bool,
}

/// Fixed-function state applied for the guard's lifetime
///
/// The state captured on construction is re-applied on drop, including
/// when a draw fails and the error is propagated.
pub struct ScopedStateOverride<'a> {
    renderer: &'a mut dyn Renderer,
    saved: StateBlock,
}

impl<'a> ScopedStateOverride<'a> {
    /// Apply `state`, restoring `saved` on drop
    pub fn new(renderer: &'a mut dyn Renderer, saved: StateBlock, state: StateBlock) -> Self {
        renderer.apply_state(&state);
        Self { renderer, saved }
    }

    /// Override `saved` with EQUAL depth testing and no depth writes
    pub fn depth_equal(renderer: &'a mut dyn Renderer, saved: StateBlock) -> Self {
        let mut state = saved;
        state.depth_test = true;
        state.depth_write = false;
        state.depth_func = CompareOp::Equal;
        Self::new(renderer, saved, state)
    }

    pub fn renderer(&mut self) -> &mut dyn Renderer {
        &mut *self.renderer
    }
}

impl Drop for ScopedStateOverride<'_> {
    fn drop(&mut self) {
        self.renderer.apply_state(&self.saved);
    }
}

/// Bind the call's material (or the override) and issue the draw
///
/// Lights are restricted to those matching the call's light mask.
///
/// # Errors
///
/// Returns the renderer's error if the draw fails.
pub fn submit_draw_call(
    renderer: &mut dyn Renderer,
    call: &DrawCall,
    frame: &FrameParams,
    options: &SubmitOptions<'_>,
) -> Result<()> {
    let material = options.override_material.unwrap_or(&call.material);

    let masked;
    let frame = if call.source.light_mask == u32::MAX || frame.lights.is_empty() {
        frame
    } else {
        masked = frame.with_light_mask(call.source.light_mask);
        &masked
    };

    material.bind(renderer, frame, &call.source.world, call.source.skin.as_deref());

    if options.depth_equal {
        let mut scoped = ScopedStateOverride::depth_equal(renderer, material.state());
        return scoped.renderer().draw(&call.command);
    }
    renderer.draw(&call.command)
}

/// Submit calls in order with the same options
pub fn submit_draw_calls(
    renderer: &mut dyn Renderer,
    calls: &[DrawCall],
    frame: &FrameParams,
    options: &SubmitOptions<'_>,
) -> Result<()> {
    for call in calls {
        submit_draw_call(renderer, call, frame, options)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
