//! Joint latent-space model of network structure and node attributes in
//! the hyperbolic plane.
//!
//! Nodes sit at fixed radii (from degree rank under a power-law
//! exponent) with learned angular coordinates; communities are latent
//! points with a learned radius, angle, and Gaussian spread. A node's
//! membership strength in a community decays with relaxed hyperbolic
//! distance to its centre; edge probability between two nodes is
//! `1 - exp(-F_u . F_v)` over the membership vectors, and attributes are
//! decoded from the same vectors by a linear/logistic map. Fitting is
//! analytic-gradient coordinate descent over five blocks (node angles,
//! community radii/angles/spreads, decoder rows), optionally fanned out
//! over a worker pool within each block.
//!
//! # References
//!
//! Papadopoulos et al. (2012). "Popularity versus similarity in growing
//! networks." Nature 489. Yang & Leskovec (2013). "Overlapping community
//! detection at scale." WSDM '13; Yang, McAuley & Leskovec (2013) add
//! node attributes to the same membership-factor edge model.

/// Run-time options and attribute families
pub mod config;

/// Observed inputs and learned parameter state
pub mod data;

/// Angular separation, relaxed distance, membership kernel
pub mod geometry;

/// Edge/attribute likelihoods and the combined objective
pub mod likelihood;

/// Sparse Jacobian of edge probabilities w.r.t. memberships
pub mod jacobian;

/// Frozen per-block state for gradient evaluation
pub mod snapshot;

/// The five analytic coordinate-gradient routines
pub mod gradient;

/// Sequential or pooled order-preserving fan-out
pub mod dispatch;

/// Epoch loop, update application, reporting seams
pub mod trainer;

/// Spectral-ordering angles and random centre/decoder draws
pub mod init;

/// Flat comma-separated parameter tables
pub mod io;

#[cfg(test)]
mod test;

pub use config::{AttributeKind, FitOptions};
pub use data::{Communities, NetworkData, Parameters};
pub use trainer::{CommunityScorer, EpochRecord, EpochVisualizer, Trainer};
