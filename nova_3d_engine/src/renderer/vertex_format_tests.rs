//! Unit tests for vertex_format.rs

use crate::error::Error;
use crate::renderer::vertex_format::*;

#[test]
fn test_vertex_format_size_and_offsets() {
    let format = VertexFormat::new(vec![
        VertexElement::new(VertexUsage::Position, 3),
        VertexElement::new(VertexUsage::Normal, 3),
        VertexElement::new(VertexUsage::TexCoord0, 2),
    ])
    .unwrap();

    assert_eq!(format.vertex_size(), 32);
    assert_eq!(format.offset_of(VertexUsage::Position), Some(0));
    assert_eq!(format.offset_of(VertexUsage::Normal), Some(12));
    assert_eq!(format.offset_of(VertexUsage::TexCoord0), Some(24));
    assert_eq!(format.offset_of(VertexUsage::Color), None);
}

#[test]
fn test_vertex_format_rejects_bad_component_count() {
    let result = VertexFormat::new(vec![VertexElement::new(VertexUsage::Position, 5)]);
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
}

#[test]
fn test_primitive_count() {
    assert_eq!(PrimitiveType::Triangles.primitive_count(9), 3);
    assert_eq!(PrimitiveType::TriangleStrip.primitive_count(6), 4);
    assert_eq!(PrimitiveType::TriangleFan.primitive_count(1), 0);
    assert_eq!(PrimitiveType::Lines.primitive_count(4), 2);
    assert_eq!(PrimitiveType::LineStrip.primitive_count(4), 3);
    assert_eq!(PrimitiveType::Points.primitive_count(4), 4);
}

#[test]
fn test_index_format_pack_and_read() {
    let packed = IndexFormat::U16.pack(&[0, 1, 513]);
    assert_eq!(packed.len(), 6);
    assert_eq!(IndexFormat::U16.read(&packed, 2), 513);

    let packed = IndexFormat::U8.pack(&[7, 255]);
    assert_eq!(IndexFormat::U8.read(&packed, 1), 255);

    let packed = IndexFormat::U32.pack(&[70_000]);
    assert_eq!(IndexFormat::U32.read(&packed, 0), 70_000);
}

#[test]
#[should_panic(expected = "does not fit")]
fn test_index_format_overflow_panics() {
    IndexFormat::U8.pack(&[256]);
}

#[test]
fn test_enum_round_trip_values() {
    assert_eq!(VertexUsage::from_u32(VertexUsage::TexCoord1 as u32), Some(VertexUsage::TexCoord1));
    assert_eq!(PrimitiveType::from_u32(4), Some(PrimitiveType::LineStrip));
    assert_eq!(IndexFormat::from_u32(3), None);
    assert_eq!(VertexUsage::from_u32(0), None);
}
