//! Frozen per-block state for gradient evaluation.
//!
//! Every coordinate block (node angles, community radii, community
//! angles, community spreads, decoder rows) takes one snapshot of the
//! parameters and the derived matrices, then evaluates all of its units
//! against it. Workers only ever see `&Snapshot`; the trainer mutates
//! parameters strictly between blocks, so no locking is needed.

use crate::config::FitOptions;
use crate::data::{Communities, NetworkData, Parameters};
use crate::geometry::Geometry;
use crate::jacobian::EdgeProbJacobian;
use crate::likelihood::{
    attribute_probability, edge_probability, noedge_matrix, with_bias,
};
use ndarray::prelude::*;

/// Immutable copy of everything one coordinate block's gradients read.
pub struct Snapshot<'a> {
    /// Observed inputs (immutable for the whole run).
    pub data: &'a NetworkData,
    /// Options in force for this fit.
    pub opts: &'a FitOptions,
    /// Copy of the node angles at block start.
    pub theta_n: Array1<f64>,
    /// Copy of the community centres at block start.
    pub communities: Communities,
    /// Copy of the decoder weights at block start.
    pub weight_kc: Array2<f64>,
    /// Separations, distances, memberships for the copied parameters.
    pub geometry: Geometry,
    /// Memberships with the constant-1 bias column appended.
    pub memb1_nc: Array2<f64>,
    /// `exp(-F F^T)`, shared across every gradient chain.
    pub noedge_nn: Array2<f64>,
    /// Clipped edge probabilities.
    pub prob_nn: Array2<f64>,
    /// Attribute predictions.
    pub pred_nk: Array2<f64>,
    /// `dL_G/dP` for the N^2-mean Bernoulli cross-entropy, precomputed
    /// once per block.
    pub dlink_dprob_nn: Array2<f64>,
}

impl<'a> Snapshot<'a> {
    /// Freeze the current parameters and recompute all derived state.
    pub fn new(data: &'a NetworkData, params: &Parameters, opts: &'a FitOptions) -> Snapshot<'a> {
        let geometry = Geometry::compute(
            &data.radii_n,
            &params.theta_n,
            &params.communities,
            opts.delta_floor,
        );
        let noedge_nn = noedge_matrix(&geometry.memb_nc);
        let prob_nn = edge_probability(&noedge_nn, opts.prob_clip);
        let memb1_nc = with_bias(&geometry.memb_nc);
        let pred_nk = attribute_probability(
            &memb1_nc,
            &params.weight_kc,
            data.attribute_kind,
            opts.prob_clip,
        );

        let nn = data.num_nodes() as f64;
        let scale = -1.0 / (nn * nn);
        let mut dlink_dprob_nn = Array2::zeros(data.adj_nn.raw_dim());
        for ((idx, &aa), &pp) in data.adj_nn.indexed_iter().zip(prob_nn.iter()) {
            dlink_dprob_nn[idx] = scale * (aa / pp - (1.0 - aa) / (1.0 - pp));
        }

        Snapshot {
            data,
            opts,
            theta_n: params.theta_n.clone(),
            communities: params.communities.clone(),
            weight_kc: params.weight_kc.clone(),
            geometry,
            memb1_nc,
            noedge_nn,
            prob_nn,
            pred_nk,
            dlink_dprob_nn,
        }
    }

    /// Jacobian builder over this snapshot's shared matrices.
    pub fn jacobian(&self) -> EdgeProbJacobian<'_> {
        EdgeProbJacobian::new(&self.noedge_nn, &self.geometry.memb_nc)
    }

    pub fn num_nodes(&self) -> usize {
        self.data.num_nodes()
    }

    pub fn num_communities(&self) -> usize {
        self.communities.len()
    }

    pub fn num_attributes(&self) -> usize {
        self.data.num_attributes()
    }
}
