/// Joint matrix palette for skinned meshes.
///
/// The animation side writes the palette; materials read it through the
/// `MatrixPalette` auto-binding at draw time.

use std::sync::RwLock;
use glam::Mat4;

pub struct MeshSkin {
    bind_shape: Mat4,
    joints: RwLock<Vec<Mat4>>,
}

impl MeshSkin {
    /// Create a skin with `joint_count` identity joints
    pub fn new(joint_count: usize) -> Self {
        Self {
            bind_shape: Mat4::IDENTITY,
            joints: RwLock::new(vec![Mat4::IDENTITY; joint_count]),
        }
    }

    pub fn with_bind_shape(mut self, bind_shape: Mat4) -> Self {
        self.bind_shape = bind_shape;
        self
    }

    pub fn joint_count(&self) -> usize {
        self.joints.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Set joint `index`; out-of-range indices are ignored
    pub fn set_joint_matrix(&self, index: usize, matrix: Mat4) {
        let mut joints = self.joints.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = joints.get_mut(index) {
            *slot = matrix;
        }
    }

    /// Joint matrices premultiplied by the bind shape
    pub fn matrix_palette(&self) -> Vec<Mat4> {
        self.joints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|joint| *joint * self.bind_shape)
            .collect()
    }
}
