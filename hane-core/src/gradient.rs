//! Analytic coordinate gradients of the joint objective.
//!
//! Each routine reads one frozen [`Snapshot`] and returns the exact
//! partial derivative of
//!
//! ```text
//! (1 - alpha) * L_G + alpha * L_X + lambda_F * |F|_1 + lambda_W * |W|_1
//! ```
//!
//! with respect to one scalar parameter (or, for the decoder, one row of
//! W). The chains run membership kernel -> edge/attribute likelihood;
//! the shared `dL_G/dP` matrix and the edge-probability Jacobian come
//! precomputed on the snapshot, so per-unit work is the chain itself.
//!
//! Derivative pieces, with `h` the relaxed distance, `s` the spread and
//! `delta` the folded separation:
//!
//! ```text
//! dF/dh      = -(h / s^2) F
//! dh/ddelta  = 2 / delta
//! dF/ds      = (h^2 / s^3) F
//! ddelta/dtheta_u  =  sign(pi - |theta_u - phi_c|) sign(theta_u - phi_c)
//! ddelta/dphi_c    = -sign(pi - |theta_u - phi_c|) sign(theta_u - phi_c)
//! ```

use crate::snapshot::Snapshot;
use anyhow::ensure;
use ndarray::prelude::*;
use std::f64::consts::PI;

/// Subgradient-friendly sign: 0 at 0.
#[inline]
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// `dL_X/dF[unit, c]` for one node row (bias column excluded).
fn attr_grad_node(snap: &Snapshot<'_>, node: usize) -> Array1<f64> {
    let nn = snap.num_nodes() as f64;
    let kk = snap.num_attributes();
    let cc = snap.num_communities();
    let cells = nn * kk as f64;

    let mut out_c = Array1::zeros(cc);
    for jj in 0..cc {
        let mut acc = 0.0;
        for k in 0..kk {
            let resid = snap.data.attr_nk[[node, k]] - snap.pred_nk[[node, k]];
            acc += resid * snap.weight_kc[[k, jj]];
        }
        out_c[jj] = -acc / cells;
    }
    out_c
}

/// `dL_X/dF[:, community]` across all nodes.
fn attr_grad_community(snap: &Snapshot<'_>, community: usize) -> Array1<f64> {
    let nn = snap.num_nodes();
    let kk = snap.num_attributes();
    let cells = (nn * kk) as f64;

    let mut out_n = Array1::zeros(nn);
    for ii in 0..nn {
        let mut acc = 0.0;
        for k in 0..kk {
            let resid = snap.data.attr_nk[[ii, k]] - snap.pred_nk[[ii, k]];
            acc += resid * snap.weight_kc[[k, community]];
        }
        out_n[ii] = -acc / cells;
    }
    out_n
}

/// Gradient of the objective with respect to one node's angle.
pub fn node_angle_gradient(snap: &Snapshot<'_>, node: usize) -> anyhow::Result<f64> {
    let cc = snap.num_communities();
    let opts = snap.opts;

    let link_c = snap.jacobian().fold_node(&snap.dlink_dprob_nn, node);
    let attr_c = attr_grad_node(snap, node);

    let mut grad = 0.0;
    for jj in 0..cc {
        let diff = snap.theta_n[node] - snap.communities.angle_c[jj];
        let delta = snap.geometry.delta_nc[[node, jj]];
        let dist = snap.geometry.dist_nc[[node, jj]];
        let memb = snap.geometry.memb_nc[[node, jj]];
        let spread = snap.communities.spread_c[jj];

        let chain = -dist / (spread * spread) * memb * (2.0 / delta)
            * (sign(PI - diff.abs()) * sign(diff));

        let upstream = (1.0 - opts.alpha) * link_c[jj]
            + opts.alpha * attr_c[jj]
            + opts.lambda_memb * sign(memb);
        grad += upstream * chain;
    }

    ensure!(grad.is_finite(), "non-finite angle gradient for node {}", node);
    Ok(grad)
}

/// Shared reduction for the three per-community routines: combine the
/// upstream objective gradient over `F[:, community]` with one chain
/// `dF[:, community]/dparam` and sum out the nodes.
fn community_gradient(
    snap: &Snapshot<'_>,
    community: usize,
    chain_n: &Array1<f64>,
) -> f64 {
    let opts = snap.opts;
    let link_n = snap.jacobian().fold_community(&snap.dlink_dprob_nn, community);
    let attr_n = attr_grad_community(snap, community);

    let mut grad = 0.0;
    for ii in 0..snap.num_nodes() {
        let memb = snap.geometry.memb_nc[[ii, community]];
        let upstream = (1.0 - opts.alpha) * link_n[ii]
            + opts.alpha * attr_n[ii]
            + opts.lambda_memb * sign(memb);
        grad += upstream * chain_n[ii];
    }
    grad
}

/// Gradient with respect to one community's centre radius
/// (`dh/dradius = 1`).
pub fn community_radius_gradient(snap: &Snapshot<'_>, community: usize) -> anyhow::Result<f64> {
    let spread = snap.communities.spread_c[community];
    let chain_n = Array1::from_shape_fn(snap.num_nodes(), |ii| {
        let dist = snap.geometry.dist_nc[[ii, community]];
        let memb = snap.geometry.memb_nc[[ii, community]];
        -dist / (spread * spread) * memb
    });

    let grad = community_gradient(snap, community, &chain_n);
    ensure!(
        grad.is_finite(),
        "non-finite radius gradient for community {}",
        community
    );
    Ok(grad)
}

/// Gradient with respect to one community's centre angle.
pub fn community_angle_gradient(snap: &Snapshot<'_>, community: usize) -> anyhow::Result<f64> {
    let spread = snap.communities.spread_c[community];
    let angle = snap.communities.angle_c[community];
    let chain_n = Array1::from_shape_fn(snap.num_nodes(), |ii| {
        let diff = snap.theta_n[ii] - angle;
        let delta = snap.geometry.delta_nc[[ii, community]];
        let dist = snap.geometry.dist_nc[[ii, community]];
        let memb = snap.geometry.memb_nc[[ii, community]];
        -dist / (spread * spread) * memb * (2.0 / delta)
            * (-sign(PI - diff.abs()) * sign(diff))
    });

    let grad = community_gradient(snap, community, &chain_n);
    ensure!(
        grad.is_finite(),
        "non-finite angle gradient for community {}",
        community
    );
    Ok(grad)
}

/// Gradient with respect to one community's spread.
pub fn community_spread_gradient(snap: &Snapshot<'_>, community: usize) -> anyhow::Result<f64> {
    let spread = snap.communities.spread_c[community];
    let chain_n = Array1::from_shape_fn(snap.num_nodes(), |ii| {
        let dist = snap.geometry.dist_nc[[ii, community]];
        let memb = snap.geometry.memb_nc[[ii, community]];
        dist * dist / (spread * spread * spread) * memb
    });

    let grad = community_gradient(snap, community, &chain_n);
    ensure!(
        grad.is_finite(),
        "non-finite spread gradient for community {}",
        community
    );
    Ok(grad)
}

/// Gradient with respect to one decoder row `W[attr, :]`, bias column
/// included. The L1 subgradient on W is added, matching the objective's
/// `+ lambda_W * |W|_1` term.
pub fn weight_row_gradient(snap: &Snapshot<'_>, attr: usize) -> anyhow::Result<Array1<f64>> {
    let nn = snap.num_nodes();
    let kk = snap.num_attributes();
    let cells = (nn * kk) as f64;
    let opts = snap.opts;

    let cols = snap.num_communities() + 1;
    let mut grad_c = Array1::zeros(cols);
    for jj in 0..cols {
        let mut acc = 0.0;
        for ii in 0..nn {
            let resid = snap.data.attr_nk[[ii, attr]] - snap.pred_nk[[ii, attr]];
            acc += resid * snap.memb1_nc[[ii, jj]];
        }
        grad_c[jj] = -opts.alpha * acc / cells
            + opts.lambda_weight * sign(snap.weight_kc[[attr, jj]]);
    }

    ensure!(
        grad_c.iter().all(|g| g.is_finite()),
        "non-finite decoder gradient for attribute {}",
        attr
    );
    Ok(grad_c)
}
