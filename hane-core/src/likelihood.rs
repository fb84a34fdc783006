//! Edge and attribute likelihoods and the combined training objective.
//!
//! The edge model is Bernoulli with rate `P = 1 - exp(-F F^T)`; the
//! attribute model decodes the bias-augmented memberships through a
//! linear map, logistic-squashed for binary attributes. Both likelihood
//! terms are means over every entry (all N^2 node pairs, self-pairs
//! included, and all N x K attribute cells).

use crate::config::{AttributeKind, FitOptions};
use crate::data::{NetworkData, Parameters};
use crate::geometry::Geometry;
use ndarray::prelude::*;

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Probability of *no* edge for each pair: `exp(-F F^T)`, unclipped.
///
/// Shared between the edge probabilities and every gradient chain, so it
/// is computed once per snapshot.
pub fn noedge_matrix(memb_nc: &Array2<f64>) -> Array2<f64> {
    let gram_nn = memb_nc.dot(&memb_nc.t());
    gram_nn.mapv(|x| (-x).exp())
}

/// Pairwise edge probabilities `1 - exp(-F F^T)`, clipped into
/// [clip, 1 - clip] so no log can blow up.
pub fn edge_probability(noedge_nn: &Array2<f64>, clip: f64) -> Array2<f64> {
    noedge_nn.mapv(|x| (1.0 - x).clamp(clip, 1.0 - clip))
}

/// Bernoulli cross-entropy of the adjacency, averaged over all N^2 pairs.
pub fn link_log_likelihood(adj_nn: &Array2<f64>, prob_nn: &Array2<f64>) -> f64 {
    let nn = adj_nn.nrows() as f64;
    let mut total = 0.0;
    for (&a, &p) in adj_nn.iter().zip(prob_nn.iter()) {
        total += a * p.ln() + (1.0 - a) * (1.0 - p).ln();
    }
    -total / (nn * nn)
}

/// Append the constant-1 bias feature as a trailing column.
pub fn with_bias(memb_nc: &Array2<f64>) -> Array2<f64> {
    let nn = memb_nc.nrows();
    let cc = memb_nc.ncols();
    let mut memb1 = Array2::ones((nn, cc + 1));
    memb1.slice_mut(s![.., ..cc]).assign(memb_nc);
    memb1
}

/// Decode attribute predictions `Q = F_biased W^T`; binary attributes get
/// the logistic link and the probability clip, real-valued ones stay
/// linear and unclipped.
pub fn attribute_probability(
    memb1_nc: &Array2<f64>,
    weight_kc: &Array2<f64>,
    kind: AttributeKind,
    clip: f64,
) -> Array2<f64> {
    let pred_nk = memb1_nc.dot(&weight_kc.t());
    match kind {
        AttributeKind::Binary => pred_nk.mapv(|x| sigmoid(x).clamp(clip, 1.0 - clip)),
        AttributeKind::Real => pred_nk,
    }
}

/// Attribute loss, averaged over all N x K cells: cross-entropy for
/// binary attributes, half squared error otherwise.
pub fn attribute_log_likelihood(
    attr_nk: &Array2<f64>,
    pred_nk: &Array2<f64>,
    kind: AttributeKind,
) -> f64 {
    let cells = (attr_nk.nrows() * attr_nk.ncols()) as f64;
    match kind {
        AttributeKind::Binary => {
            let mut total = 0.0;
            for (&x, &q) in attr_nk.iter().zip(pred_nk.iter()) {
                total += x * q.ln() + (1.0 - x) * (1.0 - q).ln();
            }
            -total / cells
        }
        AttributeKind::Real => {
            let mut total = 0.0;
            for (&x, &q) in attr_nk.iter().zip(pred_nk.iter()) {
                total += 0.5 * (x - q) * (x - q);
            }
            total / cells
        }
    }
}

/// One evaluation of the combined objective, term by term.
#[derive(Debug, Clone, Copy)]
pub struct Objective {
    /// Network Bernoulli cross-entropy.
    pub link_nll: f64,
    /// Attribute loss.
    pub attr_nll: f64,
    /// L1 penalty on the membership columns.
    pub l1_memb: f64,
    /// L1 penalty on the decoder columns.
    pub l1_weight: f64,
    /// `(1 - alpha) * link + alpha * attr + l1_memb + l1_weight`.
    pub total: f64,
}

impl Objective {
    /// Recompute geometry, memberships, and both likelihood terms from
    /// the current parameters. Pure: no state is touched.
    pub fn evaluate(data: &NetworkData, params: &Parameters, opts: &FitOptions) -> Objective {
        let geometry = Geometry::compute(
            &data.radii_n,
            &params.theta_n,
            &params.communities,
            opts.delta_floor,
        );
        let noedge_nn = noedge_matrix(&geometry.memb_nc);
        let prob_nn = edge_probability(&noedge_nn, opts.prob_clip);
        let link_nll = link_log_likelihood(&data.adj_nn, &prob_nn);

        let l1_memb = opts.lambda_memb * geometry.memb_nc.mapv(f64::abs).sum();

        let memb1_nc = with_bias(&geometry.memb_nc);
        let pred_nk = attribute_probability(
            &memb1_nc,
            &params.weight_kc,
            data.attribute_kind,
            opts.prob_clip,
        );
        let attr_nll = attribute_log_likelihood(&data.attr_nk, &pred_nk, data.attribute_kind);

        let l1_weight = opts.lambda_weight * params.weight_kc.mapv(f64::abs).sum();

        let total = (1.0 - opts.alpha) * link_nll + opts.alpha * attr_nll + l1_memb + l1_weight;

        Objective {
            link_nll,
            attr_nll,
            l1_memb,
            l1_weight,
            total,
        }
    }
}
