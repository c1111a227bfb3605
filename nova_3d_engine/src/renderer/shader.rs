/// Shader programs and uniform values

use std::fmt;
use std::sync::Arc;
use glam::{Mat4, Vec2, Vec3, Vec4};
use crate::renderer::Texture;

/// Source description of a linked shader program
///
/// `vertex` and `fragment` identify the shader sources (paths or inline code,
/// backend-defined). `defines` is a `;`-separated list of preprocessor defines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderProgramDesc {
    pub vertex: String,
    pub fragment: String,
    pub defines: String,
}

impl ShaderProgramDesc {
    pub fn new(vertex: &str, fragment: &str) -> Self {
        Self {
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
            defines: String::new(),
        }
    }

    pub fn with_defines(mut self, defines: &str) -> Self {
        self.defines = defines.to_string();
        self
    }
}

/// Linked GPU shader program
///
/// The program is destroyed when the last reference is dropped.
pub trait ShaderProgram: Send + Sync {
    /// Debug label (usually `vertex|fragment|defines`)
    fn label(&self) -> &str;
}

/// Value that can be written to a program uniform
#[derive(Clone)]
pub enum UniformValue {
    Float(f32),
    FloatArray(Vec<f32>),
    Int(i32),
    IntArray(Vec<i32>),
    Vec2(Vec2),
    Vec2Array(Vec<Vec2>),
    Vec3(Vec3),
    Vec3Array(Vec<Vec3>),
    Vec4(Vec4),
    Vec4Array(Vec<Vec4>),
    Mat4(Mat4),
    Mat4Array(Vec<Mat4>),
    Sampler(Arc<dyn Texture>),
    SamplerArray(Vec<Arc<dyn Texture>>),
}

impl UniformValue {
    /// Short type name used in logs
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::FloatArray(_) => "float[]",
            UniformValue::Int(_) => "int",
            UniformValue::IntArray(_) => "int[]",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec2Array(_) => "vec2[]",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec3Array(_) => "vec3[]",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Vec4Array(_) => "vec4[]",
            UniformValue::Mat4(_) => "mat4",
            UniformValue::Mat4Array(_) => "mat4[]",
            UniformValue::Sampler(_) => "sampler",
            UniformValue::SamplerArray(_) => "sampler[]",
        }
    }
}

impl fmt::Debug for UniformValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformValue::Float(v) => write!(f, "Float({})", v),
            UniformValue::FloatArray(v) => write!(f, "FloatArray({:?})", v),
            UniformValue::Int(v) => write!(f, "Int({})", v),
            UniformValue::IntArray(v) => write!(f, "IntArray({:?})", v),
            UniformValue::Vec2(v) => write!(f, "Vec2({:?})", v),
            UniformValue::Vec2Array(v) => write!(f, "Vec2Array({:?})", v),
            UniformValue::Vec3(v) => write!(f, "Vec3({:?})", v),
            UniformValue::Vec3Array(v) => write!(f, "Vec3Array({:?})", v),
            UniformValue::Vec4(v) => write!(f, "Vec4({:?})", v),
            UniformValue::Vec4Array(v) => write!(f, "Vec4Array({:?})", v),
            UniformValue::Mat4(v) => write!(f, "Mat4({:?})", v),
            UniformValue::Mat4Array(v) => write!(f, "Mat4Array(len={})", v.len()),
            UniformValue::Sampler(t) => {
                let info = t.info();
                write!(f, "Sampler({}x{} {:?})", info.width, info.height, info.format)
            }
            UniformValue::SamplerArray(v) => write!(f, "SamplerArray(len={})", v.len()),
        }
    }
}
