//! Hyperbolic geometry between nodes and community centres.
//!
//! Distances use a first-order relaxation of the hyperbolic law of
//! cosines, valid for large radii:
//!
//! ```text
//! delta = pi - |pi - |theta_i - angle_c||      (folded into (0, pi])
//! h     = r_i + radius_c + 2 * ln(delta / 2)
//! F     = exp(-h^2 / (2 * spread_c^2))
//! ```
//!
//! The membership kernel F is the soft cluster-assignment strength of
//! node i in community c, in (0, 1] and equal to 1 only at h = 0.

use crate::data::Communities;
use log::warn;
use ndarray::prelude::*;
use std::f64::consts::PI;

/// Folded angular separation between two angles, in [0, pi].
#[inline]
pub fn angular_separation(theta: f64, angle: f64) -> f64 {
    PI - (PI - (theta - angle).abs()).abs()
}

/// Node-to-community separations, relaxed distances, and membership
/// strengths, always recomputed together.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Folded angular separation, floored away from zero.
    pub delta_nc: Array2<f64>,
    /// Relaxed hyperbolic distance.
    pub dist_nc: Array2<f64>,
    /// Gaussian membership kernel.
    pub memb_nc: Array2<f64>,
}

impl Geometry {
    /// Compute all three matrices from current coordinates.
    ///
    /// The fold formula cannot produce a negative separation, but an exact
    /// zero (node angle meeting a centre angle) would send the log
    /// distance to negative infinity; such entries are clamped to
    /// `delta_floor` and counted.
    pub fn compute(
        radii_n: &Array1<f64>,
        theta_n: &Array1<f64>,
        communities: &Communities,
        delta_floor: f64,
    ) -> Geometry {
        let nn = radii_n.len();
        let cc = communities.len();

        let mut delta_nc = Array2::zeros((nn, cc));
        let mut dist_nc = Array2::zeros((nn, cc));
        let mut memb_nc = Array2::zeros((nn, cc));

        let mut degenerate = 0_usize;

        for ii in 0..nn {
            for jj in 0..cc {
                let mut delta = angular_separation(theta_n[ii], communities.angle_c[jj]);
                if delta <= 0.0 {
                    delta = delta_floor;
                    degenerate += 1;
                }
                let dist = radii_n[ii] + communities.radius_c[jj] + 2.0 * (delta / 2.0).ln();
                let spread = communities.spread_c[jj];
                delta_nc[[ii, jj]] = delta;
                dist_nc[[ii, jj]] = dist;
                memb_nc[[ii, jj]] = (-dist * dist / (2.0 * spread * spread)).exp();
            }
        }

        if degenerate > 0 {
            warn!(
                "{} degenerate angular separations clamped to {:e}",
                degenerate, delta_floor
            );
        }

        Geometry {
            delta_nc,
            dist_nc,
            memb_nc,
        }
    }
}
