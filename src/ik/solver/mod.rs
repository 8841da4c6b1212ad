//! Iterative solvers.
//!
//! Every solver advances a pose by one iteration per call and leaves the
//! iteration loop to [`Armature`](crate::ik::Armature). Scratch state lives
//! on the stack of each call or inside the owning armature, never in
//! globals, so separate armatures can be solved on separate threads.

mod ambitious;
mod ccd;
mod orientation;
mod qcp_chain;
mod tranquil;

pub use ambitious::AmbitiousSolver;
pub use orientation::OrientationSolver;
pub use qcp_chain::QcpChainSolver;
pub use tranquil::TranquilSolver;

use super::bone::BoneId;

/// Lower bound for the per-iteration rotation cap.
pub const MIN_DAMPENING: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverType {
    /// Chain-segment CCD; every pinned descendant pulls on each bone.
    #[default]
    Ambitious,
    /// Strand CCD with per-strand trials averaged into one update.
    Tranquil,
    /// One tranquil pass followed by one ambitious pass per iteration.
    Mixed,
    /// Strand solver that also matches target orientation and spreads
    /// twist along the strand.
    OrientationAware,
    /// Per-bone least-squares fit of effector headings.
    Qcp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    pub iterations: u32,
    dampening: f32,
    pub solver_type: SolverType,
    pub satisfy_twist: bool,
    pub satisfy_orientation: bool,
    pub inverse_weighted: bool,
    pub ability_biasing: bool,
    pub stabilization_passes: u32,
    pub resnap_on_commit: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            dampening: 5f32.to_radians(),
            solver_type: SolverType::Ambitious,
            satisfy_twist: true,
            satisfy_orientation: true,
            inverse_weighted: false,
            ability_biasing: false,
            stabilization_passes: 0,
            resnap_on_commit: true,
        }
    }
}

impl SolverConfig {
    pub fn new(solver_type: SolverType) -> Self {
        Self {
            solver_type,
            ..Default::default()
        }
    }

    /// Largest rotation, in radians, a bone may take in one iteration.
    pub fn dampening(&self) -> f32 {
        self.dampening
    }

    pub fn set_dampening(&mut self, radians: f32) {
        self.dampening = if radians.is_finite() {
            radians.max(MIN_DAMPENING)
        } else {
            MIN_DAMPENING
        };
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_dampening(mut self, radians: f32) -> Self {
        self.set_dampening(radians);
        self
    }

    pub fn with_solver_type(mut self, solver_type: SolverType) -> Self {
        self.solver_type = solver_type;
        self
    }

    pub fn with_satisfy_twist(mut self, satisfy: bool) -> Self {
        self.satisfy_twist = satisfy;
        self
    }

    pub fn with_satisfy_orientation(mut self, satisfy: bool) -> Self {
        self.satisfy_orientation = satisfy;
        self
    }

    pub fn with_inverse_weighted(mut self, enabled: bool) -> Self {
        self.inverse_weighted = enabled;
        self
    }

    pub fn with_ability_biasing(mut self, enabled: bool) -> Self {
        self.ability_biasing = enabled;
        self
    }

    pub fn with_stabilization_passes(mut self, passes: u32) -> Self {
        self.stabilization_passes = passes;
        self
    }

    pub fn with_resnap_on_commit(mut self, resnap: bool) -> Self {
        self.resnap_on_commit = resnap;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveResult {
    pub iterations: u32,
    /// Largest tip-to-target distance among the solved pins afterwards.
    pub max_tip_error: f32,
    /// Every bone the solve may have moved, each listed once.
    pub updated: Vec<BoneId>,
}

impl SolveResult {
    pub(crate) fn merge(&mut self, other: SolveResult) {
        self.iterations = self.iterations.max(other.iterations);
        self.max_tip_error = self.max_tip_error.max(other.max_tip_error);
        self.updated.extend(other.updated);
        self.updated.sort_unstable();
        self.updated.dedup();
    }
}

/// Tracks whether the largest per-iteration correction is shrinking.
#[derive(Debug, Clone, Copy, Default)]
pub struct StabilityTracker {
    converging: u32,
    diverging: u32,
    previous: Option<f32>,
}

impl StabilityTracker {
    pub fn record(&mut self, largest_delta: f32) {
        if !largest_delta.is_finite() {
            return;
        }
        if let Some(previous) = self.previous {
            if largest_delta < previous {
                self.converging += 1;
            } else if largest_delta > previous {
                self.diverging += 1;
            }
        }
        self.previous = Some(largest_delta);
    }

    /// Share of recorded trends that were converging; 0 with no history.
    pub fn stability(&self) -> f32 {
        let total = self.converging + self.diverging;
        if total == 0 {
            0.0
        } else {
            self.converging as f32 / total as f32
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
