//! Math types for PetalMix

pub use glam::{Quat, Vec3};

/// Position and orientation of the listener.
///
/// Forward is `-Z`, up is `+Y` and right is `+X` in the unrotated frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Expresses a world-space point in the pose's local frame as
    /// `(right, up, forward)` components.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        let relative = point - self.position;
        Vec3::new(
            relative.dot(self.right()),
            relative.dot(self.up()),
            relative.dot(self.forward()),
        )
    }

    /// Like [`to_local`](Self::to_local) for a direction, ignoring position.
    pub fn direction_to_local(&self, direction: Vec3) -> Vec3 {
        Vec3::new(
            direction.dot(self.right()),
            direction.dot(self.up()),
            direction.dot(self.forward()),
        )
    }

    pub fn look_at(&mut self, target: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward != Vec3::ZERO {
            self.rotation = Quat::from_rotation_arc(-Vec3::Z, forward);
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}
