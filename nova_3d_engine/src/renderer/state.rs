/// Fixed-function render state (blend, cull, depth, stencil, polygon offset)
///
/// A [`StateBlock`] is a plain value. Materials own one and the renderer applies it
/// wholesale before each draw; backends are expected to diff against the last
/// applied block.

use crate::error::{Error, Result};

// ===== RASTERIZATION ENUMS =====

/// Which faces are culled when culling is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    Front,
    Back,
    FrontAndBack,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise vertices define front face
    CounterClockwise,
    /// Clockwise vertices define front face
    Clockwise,
}

// ===== DEPTH/STENCIL ENUMS =====

/// Comparison operator for depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Never pass
    Never,
    /// Pass if value < reference
    Less,
    /// Pass if value == reference
    Equal,
    /// Pass if value <= reference
    LessOrEqual,
    /// Pass if value > reference
    Greater,
    /// Pass if value != reference
    NotEqual,
    /// Pass if value >= reference
    GreaterOrEqual,
    /// Always pass
    Always,
}

/// Stencil operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

// ===== COLOR BLEND ENUMS =====

/// Blend factor for color blending equations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    SrcAlphaSaturate,
}

/// Polygon offset (depth bias) parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    /// Slope-based depth offset
    pub factor: f32,
    /// Constant depth offset
    pub units: f32,
}

// ===== STATE BLOCK =====

/// Complete fixed-function state for one draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateBlock {
    pub blend_enabled: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,

    pub cull_enabled: bool,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,

    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareOp,

    pub stencil_test: bool,
    pub stencil_write_mask: u32,
    pub stencil_func: CompareOp,
    pub stencil_ref: u32,
    pub stencil_func_mask: u32,
    pub stencil_fail: StencilOp,
    pub stencil_depth_fail: StencilOp,
    pub stencil_pass: StencilOp,

    /// None = polygon offset disabled
    pub depth_bias: Option<DepthBias>,
}

impl Default for StateBlock {
    fn default() -> Self {
        Self {
            blend_enabled: false,
            blend_src: BlendFactor::One,
            blend_dst: BlendFactor::Zero,
            cull_enabled: false,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_test: true,
            depth_write: true,
            depth_func: CompareOp::Less,
            stencil_test: false,
            stencil_write_mask: 0xFFFF_FFFF,
            stencil_func: CompareOp::Always,
            stencil_ref: 0,
            stencil_func_mask: 0xFFFF_FFFF,
            stencil_fail: StencilOp::Keep,
            stencil_depth_fail: StencilOp::Keep,
            stencil_pass: StencilOp::Keep,
            depth_bias: None,
        }
    }
}

impl StateBlock {
    /// Set one state from its textual name/value pair
    ///
    /// Names and values are case-insensitive. Recognized names: `blend`,
    /// `blendSrc`, `blendDst`, `cullFace`, `cullFaceSide`, `frontFace`,
    /// `depthTest`, `depthWrite`, `depthFunc`, `stencilTest`, `stencilWrite`,
    /// `stencilFunc`, `stencilFuncRef`, `stencilFuncMask`, `stencilOpSfail`,
    /// `stencilOpDpfail`, `stencilOpDppass`, `polygonOffset` (`"factor,units"`
    /// or `"false"`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFormat` for an unknown name or unparsable value;
    /// the block is left unchanged.
    pub fn set_state(&mut self, name: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "blend" => self.blend_enabled = parse_bool(name, value)?,
            "blendsrc" | "srcblend" => self.blend_src = parse_blend_factor(name, value)?,
            "blenddst" | "dstblend" => self.blend_dst = parse_blend_factor(name, value)?,
            "cullface" => self.cull_enabled = parse_bool(name, value)?,
            "cullfaceside" => self.cull_mode = parse_cull_mode(name, value)?,
            "frontface" => self.front_face = parse_front_face(name, value)?,
            "depthtest" => self.depth_test = parse_bool(name, value)?,
            "depthwrite" => self.depth_write = parse_bool(name, value)?,
            "depthfunc" => self.depth_func = parse_compare_op(name, value)?,
            "stenciltest" => self.stencil_test = parse_bool(name, value)?,
            "stencilwrite" => self.stencil_write_mask = parse_u32(name, value)?,
            "stencilfunc" => self.stencil_func = parse_compare_op(name, value)?,
            "stencilfuncref" => self.stencil_ref = parse_u32(name, value)?,
            "stencilfuncmask" => self.stencil_func_mask = parse_u32(name, value)?,
            "stencilopsfail" => self.stencil_fail = parse_stencil_op(name, value)?,
            "stencilopdpfail" => self.stencil_depth_fail = parse_stencil_op(name, value)?,
            "stencilopdppass" => self.stencil_pass = parse_stencil_op(name, value)?,
            "polygonoffset" => self.depth_bias = parse_depth_bias(name, value)?,
            _ => return Err(invalid_state(name, value)),
        }
        Ok(())
    }
}

// ===== PARSING =====

fn invalid_state(name: &str, value: &str) -> Error {
    let message = format!("Invalid render state '{}' = '{}'", name, value);
    crate::engine_error!("nova3d::StateBlock", "{}", message);
    Error::InvalidFormat(message)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => Err(invalid_state(name, value)),
    }
}

fn parse_u32(name: &str, value: &str) -> Result<u32> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse::<u32>().ok(),
    };
    parsed.ok_or_else(|| invalid_state(name, value))
}

fn parse_blend_factor(name: &str, value: &str) -> Result<BlendFactor> {
    let factor = match value.to_ascii_uppercase().as_str() {
        "ZERO" => BlendFactor::Zero,
        "ONE" => BlendFactor::One,
        "SRC_COLOR" => BlendFactor::SrcColor,
        "ONE_MINUS_SRC_COLOR" => BlendFactor::OneMinusSrcColor,
        "DST_COLOR" => BlendFactor::DstColor,
        "ONE_MINUS_DST_COLOR" => BlendFactor::OneMinusDstColor,
        "SRC_ALPHA" => BlendFactor::SrcAlpha,
        "ONE_MINUS_SRC_ALPHA" => BlendFactor::OneMinusSrcAlpha,
        "DST_ALPHA" => BlendFactor::DstAlpha,
        "ONE_MINUS_DST_ALPHA" => BlendFactor::OneMinusDstAlpha,
        "CONSTANT_COLOR" => BlendFactor::ConstantColor,
        "ONE_MINUS_CONSTANT_COLOR" => BlendFactor::OneMinusConstantColor,
        "SRC_ALPHA_SATURATE" => BlendFactor::SrcAlphaSaturate,
        _ => return Err(invalid_state(name, value)),
    };
    Ok(factor)
}

fn parse_cull_mode(name: &str, value: &str) -> Result<CullMode> {
    match value.to_ascii_uppercase().as_str() {
        "BACK" => Ok(CullMode::Back),
        "FRONT" => Ok(CullMode::Front),
        "FRONT_AND_BACK" => Ok(CullMode::FrontAndBack),
        _ => Err(invalid_state(name, value)),
    }
}

fn parse_front_face(name: &str, value: &str) -> Result<FrontFace> {
    match value.to_ascii_uppercase().as_str() {
        "CCW" => Ok(FrontFace::CounterClockwise),
        "CW" => Ok(FrontFace::Clockwise),
        _ => Err(invalid_state(name, value)),
    }
}

fn parse_compare_op(name: &str, value: &str) -> Result<CompareOp> {
    let op = match value.to_ascii_uppercase().as_str() {
        "NEVER" => CompareOp::Never,
        "LESS" => CompareOp::Less,
        "EQUAL" => CompareOp::Equal,
        "LEQUAL" => CompareOp::LessOrEqual,
        "GREATER" => CompareOp::Greater,
        "NOTEQUAL" => CompareOp::NotEqual,
        "GEQUAL" => CompareOp::GreaterOrEqual,
        "ALWAYS" => CompareOp::Always,
        _ => return Err(invalid_state(name, value)),
    };
    Ok(op)
}

fn parse_stencil_op(name: &str, value: &str) -> Result<StencilOp> {
    let op = match value.to_ascii_uppercase().as_str() {
        "KEEP" => StencilOp::Keep,
        "ZERO" => StencilOp::Zero,
        "REPLACE" => StencilOp::Replace,
        "INCR" => StencilOp::IncrementAndClamp,
        "DECR" => StencilOp::DecrementAndClamp,
        "INVERT" => StencilOp::Invert,
        "INCR_WRAP" => StencilOp::IncrementAndWrap,
        "DECR_WRAP" => StencilOp::DecrementAndWrap,
        _ => return Err(invalid_state(name, value)),
    };
    Ok(op)
}

fn parse_depth_bias(name: &str, value: &str) -> Result<Option<DepthBias>> {
    if matches!(value.to_ascii_lowercase().as_str(), "false" | "off" | "none") {
        return Ok(None);
    }
    let mut parts = value.split(',').map(|p| p.trim().parse::<f32>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(factor)), Some(Ok(units)), None) => Ok(Some(DepthBias { factor, units })),
        _ => Err(invalid_state(name, value)),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
