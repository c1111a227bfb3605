/// Textures: sampled images, frame buffer attachments and shadow maps

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    /// HDR color target
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_SFLOAT,

    D16_UNORM,
    /// Shadow map depth
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Depth and depth/stencil formats
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::D16_UNORM | Self::D32_FLOAT | Self::D24_UNORM_S8_UINT)
    }
}

/// How the backend may use a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    /// Material sampler input only
    Sampled,
    /// Color attachment that later stages sample
    SampledAndRenderTarget,
    /// Depth attachment, also sampled when it is a shadow map
    DepthStencil,
}

#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// Initial texels, tightly packed rows
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

/// A backend texture; released with its last `Arc`
pub trait Texture: Send + Sync {
    fn info(&self) -> &TextureInfo;
}
