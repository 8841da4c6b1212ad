//! Weighted averaging of small rotations.
//!
//! Quaternions are summed component-wise after flipping each one into the
//! hemisphere of the running sum, then renormalized. This is only a good
//! approximation of the rotational mean while the rotations are close to each
//! other, which per-iteration dampening guarantees for the solvers.

use glam::{Quat, Vec4};

#[derive(Debug, Clone, Copy)]
pub struct RotationAverage {
    sum: Vec4,
    total_weight: f32,
    count: usize,
}

impl Default for RotationAverage {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationAverage {
    pub fn new() -> Self {
        Self {
            sum: Vec4::ZERO,
            total_weight: 0.0,
            count: 0,
        }
    }

    pub fn add(&mut self, rotation: Quat, weight: f32) {
        if weight.is_nan() || weight <= 0.0 || !rotation.is_finite() {
            return;
        }
        let mut q = Vec4::from(rotation);
        if self.sum.dot(q) < 0.0 {
            q = -q;
        }
        self.sum += q * weight;
        self.total_weight += weight;
        self.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Normalized mean, or the identity if nothing with positive weight was
    /// added.
    pub fn result(&self) -> Quat {
        if self.count == 0 || self.total_weight <= 0.0 {
            return Quat::IDENTITY;
        }
        let mean = self.sum / self.total_weight;
        if mean.length_squared() < 1e-12 {
            return Quat::IDENTITY;
        }
        Quat::from_vec4(mean.normalize())
    }
}

/// Uniformly weighted average.
pub fn average_rotations(rotations: &[Quat]) -> Quat {
    weighted_average(rotations.iter().map(|&q| (q, 1.0)))
}

pub fn weighted_average(rotations: impl IntoIterator<Item = (Quat, f32)>) -> Quat {
    let mut average = RotationAverage::new();
    for (q, w) in rotations {
        average.add(q, w);
    }
    average.result()
}

/// Averaging weight of an effector that pulls through a run of bones with
/// the given summed rotational freedom.
pub fn freedom_weight(path_freedom: f32) -> f32 {
    1.0 / path_freedom.max(1e-4)
}
