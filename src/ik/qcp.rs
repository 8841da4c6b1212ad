//! Quaternion characteristic polynomial superposition.
//!
//! Finds the rotation that best carries one weighted point set onto another in
//! the least-squares sense. The optimal quaternion is the dominant eigenvector
//! of Horn's 4x4 key matrix; its eigenvalue is refined by Newton iteration on
//! the characteristic quartic and the eigenvector is read off a row of the
//! adjugate of `N - λI`. All internal arithmetic is done in f64.

use glam::{DMat3, DMat4, DQuat, DVec3, Quat, Vec3};

const DEFAULT_EVAL_PRECISION: f64 = 1e-11;
const DEFAULT_EVEC_PRECISION: f64 = 1e-6;
const MAX_NEWTON_STEPS: usize = 50;

#[derive(Debug, Clone)]
pub struct Qcp {
    eval_precision: f64,
    evec_precision: f64,
    rmsd: f64,
    translation: DVec3,
}

impl Default for Qcp {
    fn default() -> Self {
        Self::new(DEFAULT_EVAL_PRECISION, DEFAULT_EVEC_PRECISION)
    }
}

impl Qcp {
    pub fn new(eval_precision: f64, evec_precision: f64) -> Self {
        Self {
            eval_precision: eval_precision.abs().max(f64::EPSILON),
            evec_precision: evec_precision.abs().max(f64::EPSILON),
            rmsd: 0.0,
            translation: DVec3::ZERO,
        }
    }

    /// Weighted root-mean-square deviation left by the last fit.
    pub fn rmsd(&self) -> f64 {
        self.rmsd
    }

    /// Offset to add after rotating when the last fit ran with `translate`.
    pub fn translation(&self) -> Vec3 {
        self.translation.as_vec3()
    }

    /// Rotation best carrying `moved` onto `target`, or the identity when the
    /// point sets do not determine one.
    pub fn weighted_superpose(
        &mut self,
        moved: &[Vec3],
        target: &[Vec3],
        weights: Option<&[f32]>,
        translate: bool,
    ) -> Quat {
        self.try_superpose(moved, target, weights, translate)
            .unwrap_or_else(|| {
                log::trace!("qcp: degenerate key matrix, falling back to identity");
                Quat::IDENTITY
            })
    }

    /// Like [`weighted_superpose`](Self::weighted_superpose) but reports
    /// an underdetermined fit (too few or collinear points) as `None`.
    pub fn try_superpose(
        &mut self,
        moved: &[Vec3],
        target: &[Vec3],
        weights: Option<&[f32]>,
        translate: bool,
    ) -> Option<Quat> {
        self.rmsd = 0.0;
        self.translation = DVec3::ZERO;

        let count = moved.len().min(target.len());
        let weight_of = |i: usize| {
            weights
                .and_then(|w| w.get(i))
                .map_or(1.0, |&w| f64::from(w).max(0.0))
        };
        let total: f64 = (0..count).map(weight_of).sum();
        if count == 0 || total <= 0.0 {
            return None;
        }

        let (moved_center, target_center) = if translate {
            let mc: DVec3 = (0..count).map(|i| moved[i].as_dvec3() * weight_of(i)).sum();
            let tc: DVec3 = (0..count).map(|i| target[i].as_dvec3() * weight_of(i)).sum();
            (mc / total, tc / total)
        } else {
            (DVec3::ZERO, DVec3::ZERO)
        };

        // cross-covariance: columns indexed by the target axis
        let mut s = DMat3::ZERO;
        let mut e0 = 0.0;
        for i in 0..count {
            let w = weight_of(i);
            let x = moved[i].as_dvec3() - moved_center;
            let y = target[i].as_dvec3() - target_center;
            e0 += w * (x.length_squared() + y.length_squared());
            s += DMat3::from_cols(x * (w * y.x), x * (w * y.y), x * (w * y.z));
        }
        e0 *= 0.5;

        let rotation = self.fit(&s, e0, total);
        if let Some(q) = rotation {
            if translate {
                self.translation = target_center - q * moved_center;
            }
        }
        rotation.map(|q| Quat::from_xyzw(q.x as f32, q.y as f32, q.z as f32, q.w as f32))
    }

    fn fit(&mut self, s: &DMat3, e0: f64, total_weight: f64) -> Option<DQuat> {
        // s.col(b)[a] = sum w * x_a * y_b
        let (sxx, syx, szx) = (s.x_axis.x, s.x_axis.y, s.x_axis.z);
        let (sxy, syy, szy) = (s.y_axis.x, s.y_axis.y, s.y_axis.z);
        let (sxz, syz, szz) = (s.z_axis.x, s.z_axis.y, s.z_axis.z);

        let n = [
            [sxx + syy + szz, syz - szy, szx - sxz, sxy - syx],
            [syz - szy, sxx - syy - szz, sxy + syx, szx + sxz],
            [szx - sxz, sxy + syx, -sxx + syy - szz, syz + szy],
            [sxy - syx, szx + sxz, syz + szy, -sxx - syy + szz],
        ];

        let frobenius: f64 = [s.x_axis, s.y_axis, s.z_axis]
            .iter()
            .map(|c| c.length_squared())
            .sum();
        let c2 = -2.0 * frobenius;
        let c1 = -8.0 * s.determinant();
        let c0 = DMat4::from_cols_array_2d(&n).determinant();

        let mut lambda = e0;
        for _ in 0..MAX_NEWTON_STEPS {
            let l2 = lambda * lambda;
            let b = (l2 + c2) * lambda;
            let a = b + c1;
            let f = a * lambda + c0;
            let slope = 2.0 * l2 * lambda + b + a;
            if slope.abs() < f64::MIN_POSITIVE {
                break;
            }
            let delta = f / slope;
            lambda -= delta;
            if delta.abs() < (self.eval_precision * lambda).abs() {
                break;
            }
        }
        self.rmsd = (2.0 * (e0 - lambda) / total_weight).max(0.0).sqrt();

        let mut a = n;
        for (i, row) in a.iter_mut().enumerate() {
            row[i] -= lambda;
        }
        let scale = e0.abs().max(f64::MIN_POSITIVE).powi(3);
        let floor = self.evec_precision * scale * scale;
        let q = (0..4).find_map(|row| {
            let v = adjugate_row(&a, row);
            let norm2 = v.iter().map(|c| c * c).sum::<f64>();
            (norm2 > floor && norm2.is_finite()).then_some(v)
        })?;

        let q = DQuat::from_xyzw(q[1], q[2], q[3], q[0]).normalize();
        Some(if q.w < 0.0 { -q } else { q })
    }
}

/// Cofactors of one row of a symmetric 4x4 matrix, which is proportional to
/// the null vector when the matrix has rank three.
fn adjugate_row(a: &[[f64; 4]; 4], row: usize) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (col, cofactor) in out.iter_mut().enumerate() {
        let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
        *cofactor = sign * minor(a, row, col);
    }
    out
}

fn minor(a: &[[f64; 4]; 4], skip_row: usize, skip_col: usize) -> f64 {
    let mut m = [[0.0; 3]; 3];
    for (r, src) in (0..4).filter(|&r| r != skip_row).enumerate() {
        for (c, col) in (0..4).filter(|&c| c != skip_col).enumerate() {
            m[r][c] = a[src][col];
        }
    }
    DMat3::from_cols_array_2d(&m).determinant()
}
