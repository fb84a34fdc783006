//! Sparse Jacobian of pairwise edge probabilities with respect to
//! membership values.
//!
//! For the ordered pair (u, v), `P[u,v] = 1 - exp(-F[u] . F[v])` depends
//! on the c-th membership of both endpoints:
//!
//! ```text
//! dP[u,v]/dF[u,c] = exp(-F[u] . F[v]) * F[v,c]
//! dP[u,v]/dF[v,c] = exp(-F[u] . F[v]) * F[u,c]
//! ```
//!
//! Flattened over the N^2 output pairs this is an N^2 x N matrix with two
//! nonzeros per pair; on the self-pair u = v the two chain contributions
//! land in the same slot and add, giving the exact `2 F[u,c] exp(..)`
//! derivative. The matrix is never materialised: [`EdgeProbJacobian`]
//! folds an upstream pairwise gradient straight into the per-node vector
//! it would produce.

use ndarray::prelude::*;

/// Built once per frozen snapshot from the shared no-edge matrix; applied
/// once per community (or node) unit.
pub struct EdgeProbJacobian<'a> {
    noedge_nn: &'a Array2<f64>,
    memb_nc: &'a Array2<f64>,
}

impl<'a> EdgeProbJacobian<'a> {
    pub fn new(noedge_nn: &'a Array2<f64>, memb_nc: &'a Array2<f64>) -> Self {
        EdgeProbJacobian { noedge_nn, memb_nc }
    }

    /// Fold an upstream gradient over all pairs through the Jacobian of
    /// one community column: returns `d(sum_{u,v} g[u,v] * P[u,v]) /
    /// dF[:,community]` as a length-N vector.
    pub fn fold_community(&self, dl_dprob_nn: &Array2<f64>, community: usize) -> Array1<f64> {
        let nn = self.noedge_nn.nrows();
        let mut out_n = Array1::zeros(nn);
        for uu in 0..nn {
            for vv in 0..nn {
                let gg = dl_dprob_nn[[uu, vv]] * self.noedge_nn[[uu, vv]];
                out_n[uu] += gg * self.memb_nc[[vv, community]];
                out_n[vv] += gg * self.memb_nc[[uu, community]];
            }
        }
        out_n
    }

    /// Fold an upstream gradient through the Jacobian of one node's full
    /// membership row: returns `d(sum_{u,v} g[u,v] * P[u,v]) / dF[node,:]`
    /// as a length-C vector. Both pair orientations (node, v) and
    /// (v, node) contribute; the self-pair doubles naturally.
    pub fn fold_node(&self, dl_dprob_nn: &Array2<f64>, node: usize) -> Array1<f64> {
        let nn = self.noedge_nn.nrows();
        let cc = self.memb_nc.ncols();
        let mut out_c = Array1::zeros(cc);
        for vv in 0..nn {
            let gg = (dl_dprob_nn[[node, vv]] + dl_dprob_nn[[vv, node]])
                * self.noedge_nn[[node, vv]];
            for jj in 0..cc {
                out_c[jj] += gg * self.memb_nc[[vv, jj]];
            }
        }
        out_c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::likelihood::noedge_matrix;
    use approx::assert_relative_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_case(seed: u64) -> (Array2<f64>, Array2<f64>) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let memb = Array2::from_shape_fn((5, 3), |_| 0.1 + 0.8 * rng.random::<f64>());
        // deliberately asymmetric upstream gradient
        let upstream = Array2::from_shape_fn((5, 5), |_| rng.random::<f64>() - 0.5);
        (memb, upstream)
    }

    fn weighted_prob_sum(memb: &Array2<f64>, upstream: &Array2<f64>) -> f64 {
        let gram = memb.dot(&memb.t());
        let mut total = 0.0;
        for uu in 0..memb.nrows() {
            for vv in 0..memb.nrows() {
                total += upstream[[uu, vv]] * (1.0 - (-gram[[uu, vv]]).exp());
            }
        }
        total
    }

    #[test]
    fn community_fold_matches_finite_differences() {
        let (memb, upstream) = random_case(7);
        let noedge = noedge_matrix(&memb);
        let jac = EdgeProbJacobian::new(&noedge, &memb);
        let grad = jac.fold_community(&upstream, 1);

        let hh = 1e-6;
        for ii in 0..memb.nrows() {
            let mut plus = memb.clone();
            plus[[ii, 1]] += hh;
            let mut minus = memb.clone();
            minus[[ii, 1]] -= hh;
            let numeric =
                (weighted_prob_sum(&plus, &upstream) - weighted_prob_sum(&minus, &upstream))
                    / (2.0 * hh);
            assert_relative_eq!(grad[ii], numeric, epsilon = 1e-7, max_relative = 1e-6);
        }
    }

    #[test]
    fn node_fold_matches_finite_differences() {
        let (memb, upstream) = random_case(11);
        let noedge = noedge_matrix(&memb);
        let jac = EdgeProbJacobian::new(&noedge, &memb);
        let node = 2;
        let grad = jac.fold_node(&upstream, node);

        let hh = 1e-6;
        for jj in 0..memb.ncols() {
            let mut plus = memb.clone();
            plus[[node, jj]] += hh;
            let mut minus = memb.clone();
            minus[[node, jj]] -= hh;
            let numeric =
                (weighted_prob_sum(&plus, &upstream) - weighted_prob_sum(&minus, &upstream))
                    / (2.0 * hh);
            assert_relative_eq!(grad[jj], numeric, epsilon = 1e-7, max_relative = 1e-6);
        }
    }
}
