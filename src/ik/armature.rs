use std::fmt;

use super::bone::BoneId;
use super::chain::{ChainSegmentation, SegmentId};
use super::qcp::Qcp;
use super::skeleton::Skeleton;
use super::solver::{
    AmbitiousSolver, OrientationSolver, QcpChainSolver, SolveResult, SolverConfig, SolverType,
    StabilityTracker, TranquilSolver,
};
use super::strand::{CollectionId, StrandSegmentation};
use crate::error::{IkError, Result};

/// Called once per touched bone after every completed solve.
pub type UpdateHook = Box<dyn FnMut(BoneId, &Skeleton) + Send>;

/// A skeleton together with its derived segmentations and solver settings.
///
/// Segmentations are derived from the set of pinned bones; call
/// [`rebuild_segmentation`](Self::rebuild_segmentation) after pinning,
/// unpinning, or adding bones.
pub struct Armature {
    skeleton: Skeleton,
    config: SolverConfig,
    chains: ChainSegmentation,
    strands: StrandSegmentation,
    qcp: Qcp,
    stability: StabilityTracker,
    update_hook: Option<UpdateHook>,
}

impl fmt::Debug for Armature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Armature")
            .field("bones", &self.skeleton.len())
            .field("config", &self.config)
            .field("segments", &self.chains.len())
            .field("collections", &self.strands.len())
            .finish_non_exhaustive()
    }
}

impl Armature {
    pub fn new(skeleton: Skeleton) -> Self {
        Self::with_config(skeleton, SolverConfig::default())
    }

    pub fn with_config(skeleton: Skeleton, config: SolverConfig) -> Self {
        let chains = ChainSegmentation::build(&skeleton);
        let strands = StrandSegmentation::build(&skeleton);
        Self {
            skeleton,
            config,
            chains,
            strands,
            qcp: Qcp::default(),
            stability: StabilityTracker::default(),
            update_hook: None,
        }
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    pub fn into_skeleton(self) -> Skeleton {
        self.skeleton
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    pub fn chains(&self) -> &ChainSegmentation {
        &self.chains
    }

    pub fn strands(&self) -> &StrandSegmentation {
        &self.strands
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.config.iterations = iterations;
    }

    /// Radians; floored at [`MIN_DAMPENING`](super::solver::MIN_DAMPENING).
    pub fn set_dampening(&mut self, radians: f32) {
        self.config.set_dampening(radians);
    }

    pub fn set_solver_type(&mut self, solver_type: SolverType) {
        self.config.solver_type = solver_type;
    }

    pub fn set_satisfy_twist(&mut self, satisfy: bool) {
        self.config.satisfy_twist = satisfy;
    }

    pub fn set_satisfy_orientation(&mut self, satisfy: bool) {
        self.config.satisfy_orientation = satisfy;
    }

    pub fn set_inverse_weighted(&mut self, enabled: bool) {
        self.config.inverse_weighted = enabled;
    }

    pub fn set_ability_biasing(&mut self, enabled: bool) {
        self.config.ability_biasing = enabled;
    }

    pub fn set_stabilization_passes(&mut self, passes: u32) {
        self.config.stabilization_passes = passes;
    }

    pub fn set_resnap_on_commit(&mut self, resnap: bool) {
        self.config.resnap_on_commit = resnap;
    }

    pub fn set_update_hook(&mut self, hook: impl FnMut(BoneId, &Skeleton) + Send + 'static) {
        self.update_hook = Some(Box::new(hook));
    }

    pub fn clear_update_hook(&mut self) {
        self.update_hook = None;
    }

    pub fn rebuild_segmentation(&mut self) {
        self.chains = ChainSegmentation::build(&self.skeleton);
        self.strands = StrandSegmentation::build(&self.skeleton);
    }

    /// Convergence of the strand solvers so far, in `[0, 1]`.
    pub fn stability(&self) -> f32 {
        self.stability.stability()
    }

    pub fn reset_stability_measures(&mut self) {
        self.stability.reset();
    }

    /// Solves the pinned-root subproblem containing `bone` and every
    /// subproblem nested below it.
    pub fn solve(&mut self, bone: BoneId) -> Result<SolveResult> {
        self.skeleton.bone(bone)?;
        if self.chains.chain_for(bone).is_none() {
            self.rebuild_segmentation();
        }
        let segment = self
            .chains
            .chain_for(bone)
            .ok_or(IkError::UnknownBone(bone))?;
        let root = self.chains.pinned_root_chain(segment);
        let region = self.chains.pinned_root_chains_below(root);
        if region.is_empty() {
            log::debug!("nothing pinned below {bone:?}, skipping solve");
            return Ok(SolveResult::default());
        }

        let collection = self
            .strands
            .collection_rooted_at(self.chains.segment(root).root());
        let config = self.config;
        for iteration in 0..config.iterations {
            self.iterate(root, collection, &config);
            if log::log_enabled!(log::Level::Trace) {
                log::trace!(
                    "iteration {iteration}: max tip error {}",
                    self.max_tip_error(&region)
                );
            }
        }

        let mut updated: Vec<BoneId> = region
            .iter()
            .flat_map(|&s| self.chains.subproblem_bones(s))
            .collect();
        updated.sort_unstable();
        updated.dedup();
        if let Some(hook) = self.update_hook.as_mut() {
            for &id in &updated {
                hook(id, &self.skeleton);
            }
        }

        let result = SolveResult {
            iterations: config.iterations,
            max_tip_error: self.max_tip_error(&region),
            updated,
        };
        log::debug!(
            "solved {bone:?} with {:?}: {} bones, max tip error {:.5}",
            config.solver_type,
            result.updated.len(),
            result.max_tip_error
        );
        Ok(result)
    }

    /// Solves every independent tree of the skeleton.
    pub fn solve_all(&mut self) -> Result<SolveResult> {
        let roots: Vec<BoneId> = self
            .chains
            .roots()
            .iter()
            .map(|&s| self.chains.segment(s).root())
            .collect();
        let mut total = SolveResult::default();
        for bone in roots {
            total.merge(self.solve(bone)?);
        }
        Ok(total)
    }

    fn iterate(
        &mut self,
        root: SegmentId,
        collection: Option<CollectionId>,
        config: &SolverConfig,
    ) {
        let skeleton = &mut self.skeleton;
        match config.solver_type {
            SolverType::Ambitious => AmbitiousSolver::iterate(skeleton, &self.chains, root, config),
            SolverType::Qcp => {
                QcpChainSolver::iterate(skeleton, &self.chains, root, config, &mut self.qcp)
            }
            SolverType::Tranquil => {
                if let Some(c) = collection {
                    let delta = TranquilSolver::iterate(skeleton, &self.strands, c, config);
                    self.stability.record(delta);
                }
            }
            SolverType::Mixed => {
                if let Some(c) = collection {
                    let delta = TranquilSolver::iterate(skeleton, &self.strands, c, config);
                    self.stability.record(delta);
                }
                AmbitiousSolver::iterate(skeleton, &self.chains, root, config);
            }
            SolverType::OrientationAware => {
                if let Some(c) = collection {
                    let delta = OrientationSolver::iterate(skeleton, &self.strands, c, config);
                    self.stability.record(delta);
                }
            }
        }
    }

    fn max_tip_error(&self, region: &[SegmentId]) -> f32 {
        region
            .iter()
            .flat_map(|&s| self.chains.effectors_of(s))
            .filter_map(|b| self.skeleton.pin_error(b))
            .fold(0.0, f32::max)
    }
}
