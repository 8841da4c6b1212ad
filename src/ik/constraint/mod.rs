//! Kusudama swing/twist constraints.

mod kusudama;
mod limit_cone;

pub use kusudama::{Kusudama, Projection};
pub use limit_cone::LimitCone;
