//! Observed inputs and learned parameter state.
//!
//! The observed side (radii, adjacency, attributes) is set once by the
//! loading collaborator and never mutated during training. The learned
//! side (node angles, community centres, decoder weights) is owned by the
//! trainer and updated one coordinate block at a time.

use crate::config::AttributeKind;
use anyhow::ensure;
use ndarray::prelude::*;

/// Immutable observed data: one network plus node attributes.
#[derive(Debug, Clone)]
pub struct NetworkData {
    /// Fixed radial coordinate per node, derived externally from degree
    /// rank and a power-law exponent.
    pub radii_n: Array1<f64>,
    /// Symmetric 0/1 adjacency.
    pub adj_nn: Array2<f64>,
    /// Node attribute matrix, binary or real-valued.
    pub attr_nk: Array2<f64>,
    /// Attribute likelihood family.
    pub attribute_kind: AttributeKind,
}

impl NetworkData {
    /// Validate shapes once, up front.
    pub fn new(
        radii_n: Array1<f64>,
        adj_nn: Array2<f64>,
        attr_nk: Array2<f64>,
        attribute_kind: AttributeKind,
    ) -> anyhow::Result<Self> {
        let nn = radii_n.len();
        ensure!(nn > 0, "empty network");
        ensure!(
            adj_nn.nrows() == nn && adj_nn.ncols() == nn,
            "adjacency is {} x {}, expected {} x {}",
            adj_nn.nrows(),
            adj_nn.ncols(),
            nn,
            nn
        );
        ensure!(
            attr_nk.nrows() == nn,
            "attribute matrix has {} rows for {} nodes",
            attr_nk.nrows(),
            nn
        );
        ensure!(attr_nk.ncols() > 0, "attribute matrix has no columns");
        ensure!(
            radii_n.iter().all(|&r| r.is_finite() && r > 0.0),
            "node radii must be finite and positive"
        );
        Ok(NetworkData {
            radii_n,
            adj_nn,
            attr_nk,
            attribute_kind,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.radii_n.len()
    }

    pub fn num_attributes(&self) -> usize {
        self.attr_nk.ncols()
    }
}

/// Community centres in the hyperbolic plane, stored column-wise: a
/// radial coordinate, an angular coordinate, and a Gaussian spread per
/// community.
#[derive(Debug, Clone)]
pub struct Communities {
    pub radius_c: Array1<f64>,
    pub angle_c: Array1<f64>,
    pub spread_c: Array1<f64>,
}

impl Communities {
    pub fn len(&self) -> usize {
        self.radius_c.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radius_c.is_empty()
    }
}

/// Learned parameter state, mutated in place between coordinate blocks.
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Node angular coordinates, wrapped into [0, 2*pi).
    pub theta_n: Array1<f64>,
    /// Community centres.
    pub communities: Communities,
    /// Attribute decoder, K x (C+1); the last column multiplies an
    /// implicit constant-1 feature.
    pub weight_kc: Array2<f64>,
}

impl Parameters {
    pub fn num_communities(&self) -> usize {
        self.communities.len()
    }
}
