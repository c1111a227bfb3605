/// Vertex layouts, primitive topology and index formats

use crate::error::{Error, Result};

/// Semantic of one vertex element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum VertexUsage {
    Position = 1,
    Normal = 2,
    Color = 3,
    Tangent = 4,
    Binormal = 5,
    BlendWeights = 6,
    BlendIndices = 7,
    TexCoord0 = 8,
    TexCoord1 = 9,
    TexCoord2 = 10,
    TexCoord3 = 11,
}

impl VertexUsage {
    pub fn from_u32(value: u32) -> Option<Self> {
        let usage = match value {
            1 => VertexUsage::Position,
            2 => VertexUsage::Normal,
            3 => VertexUsage::Color,
            4 => VertexUsage::Tangent,
            5 => VertexUsage::Binormal,
            6 => VertexUsage::BlendWeights,
            7 => VertexUsage::BlendIndices,
            8 => VertexUsage::TexCoord0,
            9 => VertexUsage::TexCoord1,
            10 => VertexUsage::TexCoord2,
            11 => VertexUsage::TexCoord3,
            _ => return None,
        };
        Some(usage)
    }
}

/// One vertex element: a semantic and a number of f32 components (1..=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub usage: VertexUsage,
    pub size: u32,
}

impl VertexElement {
    pub fn new(usage: VertexUsage, size: u32) -> Self {
        Self { usage, size }
    }
}

/// Ordered list of interleaved vertex elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    elements: Vec<VertexElement>,
    vertex_size: u32,
}

impl VertexFormat {
    /// Create a format from its elements
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFormat` if an element has 0 or more than 4 components.
    pub fn new(elements: Vec<VertexElement>) -> Result<Self> {
        if let Some(bad) = elements.iter().find(|e| e.size == 0 || e.size > 4) {
            return Err(Error::InvalidFormat(format!(
                "Vertex element {:?} has {} components (expected 1..=4)",
                bad.usage, bad.size
            )));
        }
        let vertex_size = elements.iter().map(|e| e.size * 4).sum();
        Ok(Self { elements, vertex_size })
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Stride of one vertex in bytes
    pub fn vertex_size(&self) -> u32 {
        self.vertex_size
    }

    /// Byte offset of the first element with `usage`
    pub fn offset_of(&self, usage: VertexUsage) -> Option<u32> {
        let mut offset = 0;
        for element in &self.elements {
            if element.usage == usage {
                return Some(offset);
            }
            offset += element.size * 4;
        }
        None
    }

    /// The element with `usage`, if present
    pub fn element(&self, usage: VertexUsage) -> Option<&VertexElement> {
        self.elements.iter().find(|e| e.usage == usage)
    }
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveType {
    Triangles = 0,
    TriangleStrip = 1,
    TriangleFan = 2,
    Lines = 3,
    LineStrip = 4,
    Points = 5,
}

impl PrimitiveType {
    pub fn from_u32(value: u32) -> Option<Self> {
        let primitive = match value {
            0 => PrimitiveType::Triangles,
            1 => PrimitiveType::TriangleStrip,
            2 => PrimitiveType::TriangleFan,
            3 => PrimitiveType::Lines,
            4 => PrimitiveType::LineStrip,
            5 => PrimitiveType::Points,
            _ => return None,
        };
        Some(primitive)
    }

    /// Number of primitives described by `count` indices (or vertices)
    pub fn primitive_count(&self, count: u32) -> u32 {
        match self {
            PrimitiveType::Triangles => count / 3,
            PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => count.saturating_sub(2),
            PrimitiveType::Lines => count / 2,
            PrimitiveType::LineStrip => count.saturating_sub(1),
            PrimitiveType::Points => count,
        }
    }
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum IndexFormat {
    /// 8-bit indices (max 255 vertices)
    U8 = 1,
    /// 16-bit indices (max 65535 vertices)
    U16 = 2,
    /// 32-bit indices
    U32 = 4,
}

impl IndexFormat {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(IndexFormat::U8),
            2 => Some(IndexFormat::U16),
            4 => Some(IndexFormat::U32),
            _ => None,
        }
    }

    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        *self as u32
    }

    /// Largest index value representable
    pub fn max_index(&self) -> u32 {
        match self {
            IndexFormat::U8 => u8::MAX as u32,
            IndexFormat::U16 => u16::MAX as u32,
            IndexFormat::U32 => u32::MAX,
        }
    }

    /// Read index `i` from a packed little-endian index array
    pub fn read(&self, bytes: &[u8], i: usize) -> u32 {
        match self {
            IndexFormat::U8 => bytes[i] as u32,
            IndexFormat::U16 => u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]) as u32,
            IndexFormat::U32 => u32::from_le_bytes([
                bytes[i * 4],
                bytes[i * 4 + 1],
                bytes[i * 4 + 2],
                bytes[i * 4 + 3],
            ]),
        }
    }

    /// Append `index` to a packed little-endian index array
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in this format.
    pub fn write(&self, out: &mut Vec<u8>, index: u32) {
        assert!(
            index <= self.max_index(),
            "Index {} does not fit in {:?}",
            index,
            self
        );
        match self {
            IndexFormat::U8 => out.push(index as u8),
            IndexFormat::U16 => out.extend_from_slice(&(index as u16).to_le_bytes()),
            IndexFormat::U32 => out.extend_from_slice(&index.to_le_bytes()),
        }
    }

    /// Pack a slice of indices
    pub fn pack(&self, indices: &[u32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(indices.len() * self.size_bytes() as usize);
        for &index in indices {
            self.write(&mut out, index);
        }
        out
    }
}

#[cfg(test)]
#[path = "vertex_format_tests.rs"]
mod tests;
