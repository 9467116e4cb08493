use glam::{Affine3A, Mat4, Quat, Vec3};

/// Maps world-space points into the grid's local frame (X/Z horizontal, +Y height).
///
/// The grid can be placed and rotated anywhere in the world; brush math only
/// ever runs in local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldToGridTransform {
    local_to_world: Affine3A,
    world_to_local: Affine3A,
}

impl WorldToGridTransform {
    pub const IDENTITY: Self = Self {
        local_to_world: Affine3A::IDENTITY,
        world_to_local: Affine3A::IDENTITY,
    };

    /// `local_to_world` is the grid's placement in the world.
    pub fn new(local_to_world: Affine3A) -> Self {
        Self {
            local_to_world,
            world_to_local: local_to_world.inverse(),
        }
    }

    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self::new(Affine3A::from_rotation_translation(rotation, translation))
    }

    /// Column-major 4x4 matrix, for engines that bring their own math types.
    pub fn from_cols_array(cols: [f32; 16]) -> Self {
        Self::new(Affine3A::from_mat4(Mat4::from_cols_array(&cols)))
    }

    pub fn to_local(&self, world: Vec3) -> Vec3 {
        self.world_to_local.transform_point3(world)
    }

    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.local_to_world.transform_point3(local)
    }

    pub fn local_to_world(&self) -> Affine3A {
        self.local_to_world
    }
}

impl Default for WorldToGridTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
