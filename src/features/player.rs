use std::sync::{Arc, Mutex, MutexGuard};

use crate::transport::{Rotation, SpawnInfo, Vec3};

/// Where the bot stands and looks, as last reported or commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub position: Vec3,
    pub rotation: Rotation,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 64.0, 0.0),
            rotation: Rotation::default(),
        }
    }
}

impl PlayerState {
    /// Turn right by `step` degrees, wrapping back to 0 at a full turn.
    pub fn rotate(&mut self, step: f32) -> Rotation {
        self.rotation.yaw += step;
        if self.rotation.yaw >= 360.0 {
            self.rotation.yaw = 0.0;
        }
        self.rotation
    }
}

/// Player state shared between a controller and its drivers.
#[derive(Debug, Clone, Default)]
pub struct SharedPlayer(Arc<Mutex<PlayerState>>);

impl SharedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, PlayerState> {
        // A poisoned lock only means a driver panicked mid-update; the
        // coordinates are still usable.
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> PlayerState {
        *self.lock()
    }

    /// Reset from a spawn notification.
    pub fn spawn(&self, info: &SpawnInfo) {
        let mut p = self.lock();
        *p = PlayerState::default();
        if let Some(position) = info.position {
            p.position = position;
        }
    }

    pub fn moved(&self, position: Vec3, rotation: Rotation) {
        let mut p = self.lock();
        p.position = position;
        p.rotation = rotation;
    }
}
