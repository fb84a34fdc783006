//! Coordinate-descent training loop.
//!
//! One epoch walks five coordinate blocks in a fixed order — node
//! angles, community radii, community angles, community spreads, decoder
//! rows — each against a fresh frozen snapshot, then reports the loss
//! breakdown. Parameters are only ever mutated between blocks.

use crate::config::FitOptions;
use crate::data::{NetworkData, Parameters};
use crate::dispatch::Dispatcher;
use crate::geometry::Geometry;
use crate::gradient::{
    community_angle_gradient, community_radius_gradient, community_spread_gradient,
    node_angle_gradient, weight_row_gradient,
};
use crate::likelihood::Objective;
use crate::snapshot::Snapshot;
use anyhow::ensure;
use log::{debug, info, warn};
use ndarray::prelude::*;
use std::f64::consts::TAU;

/// Clustering-agreement seam: supplied by the caller together with
/// ground-truth labels, evaluated on `argmax_c F[i,c]` after each epoch.
pub trait CommunityScorer {
    /// Agreement between a ground-truth labelling and a predicted one.
    fn score(&self, truth: &[usize], predicted: &[usize]) -> f64;
}

/// Everything a rendering collaborator gets to see after an epoch.
pub struct EpochView<'a> {
    pub epoch: usize,
    pub radii_n: &'a Array1<f64>,
    pub theta_n: &'a Array1<f64>,
    pub communities: &'a crate::data::Communities,
    pub link_nll: f64,
    pub attr_nll: f64,
}

/// Rendering seam, invoked after each epoch when configured. The trainer
/// never renders anything itself.
pub trait EpochVisualizer {
    fn render(&self, view: &EpochView<'_>) -> anyhow::Result<()>;
}

/// Per-epoch loss record, also emitted through `log`.
#[derive(Debug, Clone, Copy)]
pub struct EpochRecord {
    pub epoch: usize,
    pub alpha: f64,
    pub link_nll: f64,
    pub attr_nll: f64,
    pub l1_memb: f64,
    pub l1_weight: f64,
    pub total: f64,
    /// Clustering agreement, when ground truth was supplied.
    pub agreement: Option<f64>,
}

/// Owns the mutable parameter state and the worker pool for one fit.
pub struct Trainer<'a> {
    data: &'a NetworkData,
    opts: FitOptions,
    dispatcher: Dispatcher,
    params: Parameters,
    truth: Option<(Vec<usize>, Box<dyn CommunityScorer>)>,
    visualizer: Option<Box<dyn EpochVisualizer>>,
}

impl<'a> Trainer<'a> {
    pub fn new(
        data: &'a NetworkData,
        params: Parameters,
        opts: FitOptions,
    ) -> anyhow::Result<Trainer<'a>> {
        opts.validate()?;
        let nn = data.num_nodes();
        let kk = data.num_attributes();
        let cc = opts.num_communities;
        ensure!(
            params.theta_n.len() == nn,
            "theta has {} entries for {} nodes",
            params.theta_n.len(),
            nn
        );
        ensure!(
            params.num_communities() == cc,
            "community state has {} centres, options say {}",
            params.num_communities(),
            cc
        );
        ensure!(
            params.weight_kc.dim() == (kk, cc + 1),
            "decoder is {:?}, expected ({}, {})",
            params.weight_kc.dim(),
            kk,
            cc + 1
        );

        let dispatcher = Dispatcher::new(opts.num_threads)?;
        Ok(Trainer {
            data,
            opts,
            dispatcher,
            params,
            truth: None,
            visualizer: None,
        })
    }

    /// Attach ground-truth labels and the external agreement scorer.
    pub fn with_ground_truth(
        mut self,
        labels: Vec<usize>,
        scorer: Box<dyn CommunityScorer>,
    ) -> anyhow::Result<Self> {
        ensure!(
            labels.len() == self.data.num_nodes(),
            "{} ground-truth labels for {} nodes",
            labels.len(),
            self.data.num_nodes()
        );
        self.truth = Some((labels, scorer));
        Ok(self)
    }

    /// Attach a rendering collaborator.
    pub fn with_visualizer(mut self, visualizer: Box<dyn EpochVisualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Hand the trained parameters to the export collaborator.
    pub fn into_params(self) -> Parameters {
        self.params
    }

    /// Hard community assignment per node: `argmax_c F[i,c]`.
    pub fn community_assignments(&self) -> Vec<usize> {
        let geometry = Geometry::compute(
            &self.data.radii_n,
            &self.params.theta_n,
            &self.params.communities,
            self.opts.delta_floor,
        );
        geometry
            .memb_nc
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                let mut best_val = f64::NEG_INFINITY;
                for (jj, &val) in row.iter().enumerate() {
                    if val > best_val {
                        best_val = val;
                        best = jj;
                    }
                }
                best
            })
            .collect()
    }

    /// Run the configured number of epochs and return one record per
    /// epoch. No early stopping.
    pub fn fit(&mut self) -> anyhow::Result<Vec<EpochRecord>> {
        let initial = Objective::evaluate(self.data, &self.params, &self.opts);
        info!(
            "fit: n={}, k={}, c={}, epochs={}, eta={}, workers={}",
            self.data.num_nodes(),
            self.data.num_attributes(),
            self.opts.num_communities,
            self.opts.num_epochs,
            self.opts.learning_rate,
            self.dispatcher.num_workers(),
        );
        log_breakdown(None, self.opts.alpha, &initial, None);

        let mut records = Vec::with_capacity(self.opts.num_epochs);
        for epoch in 0..self.opts.num_epochs {
            self.update_node_angles()?;
            self.update_community_radii()?;
            self.update_community_angles()?;
            self.update_community_spreads()?;
            self.update_weights()?;
            records.push(self.report(epoch)?);
        }
        Ok(records)
    }

    fn update_node_angles(&mut self) -> anyhow::Result<()> {
        let snap = Snapshot::new(self.data, &self.params, &self.opts);
        let grads = self.dispatcher.dispatch(&snap, snap.num_nodes(), |task| {
            node_angle_gradient(task.shared, task.unit)
        })?;
        let mut grad_n = Array1::from_vec(grads);
        soft_clip(&mut grad_n, self.opts.max_grad_norm);

        let lr = self.opts.learning_rate;
        ndarray::Zip::from(&mut self.params.theta_n)
            .and(&grad_n)
            .for_each(|theta, &grad| {
                *theta = (*theta - lr * grad).rem_euclid(TAU);
            });
        Ok(())
    }

    /// Dispatch one per-community routine and return its clipped block
    /// gradient.
    fn community_block<R>(&self, routine: R) -> anyhow::Result<Array1<f64>>
    where
        R: Fn(&Snapshot<'_>, usize) -> anyhow::Result<f64> + Sync,
    {
        let snap = Snapshot::new(self.data, &self.params, &self.opts);
        let grads = self
            .dispatcher
            .dispatch(&snap, snap.num_communities(), |task| {
                routine(task.shared, task.unit)
            })?;
        let mut grad_c = Array1::from_vec(grads);
        soft_clip(&mut grad_c, self.opts.max_grad_norm);
        Ok(grad_c)
    }

    fn update_community_radii(&mut self) -> anyhow::Result<()> {
        let grad_c = self.community_block(community_radius_gradient)?;
        let lr = self.opts.learning_rate;
        let crossed = step_counting_sign_crossings(
            &mut self.params.communities.radius_c,
            &grad_c,
            lr,
        );
        if crossed > 0 {
            warn!("{} community radii crossed zero; continuing unconstrained", crossed);
        }
        Ok(())
    }

    fn update_community_angles(&mut self) -> anyhow::Result<()> {
        let grad_c = self.community_block(community_angle_gradient)?;
        let lr = self.opts.learning_rate;
        ndarray::Zip::from(&mut self.params.communities.angle_c)
            .and(&grad_c)
            .for_each(|angle, &grad| {
                *angle = (*angle - lr * grad).rem_euclid(TAU);
            });
        Ok(())
    }

    fn update_community_spreads(&mut self) -> anyhow::Result<()> {
        let grad_c = self.community_block(community_spread_gradient)?;
        let lr = self.opts.learning_rate;
        let crossed = step_counting_sign_crossings(
            &mut self.params.communities.spread_c,
            &grad_c,
            lr,
        );
        if crossed > 0 {
            warn!(
                "{} community spreads crossed zero; continuing unconstrained",
                crossed
            );
        }
        Ok(())
    }

    fn update_weights(&mut self) -> anyhow::Result<()> {
        let snap = Snapshot::new(self.data, &self.params, &self.opts);
        let rows = self
            .dispatcher
            .dispatch(&snap, snap.num_attributes(), |task| {
                weight_row_gradient(task.shared, task.unit)
            })?;

        let dim = self.params.weight_kc.raw_dim();
        let mut grad_kc = Array2::zeros(dim);
        for (k, row) in rows.into_iter().enumerate() {
            grad_kc.row_mut(k).assign(&row);
        }
        soft_clip(&mut grad_kc, self.opts.max_grad_norm);

        let lr = self.opts.learning_rate;
        ndarray::Zip::from(&mut self.params.weight_kc)
            .and(&grad_kc)
            .for_each(|w, &grad| {
                *w -= lr * grad;
            });
        Ok(())
    }

    fn report(&self, epoch: usize) -> anyhow::Result<EpochRecord> {
        let objective = Objective::evaluate(self.data, &self.params, &self.opts);

        let agreement = self.truth.as_ref().map(|(labels, scorer)| {
            let predicted = self.community_assignments();
            scorer.score(labels, &predicted)
        });

        log_breakdown(Some(epoch), self.opts.alpha, &objective, agreement);

        if let Some(visualizer) = &self.visualizer {
            visualizer.render(&EpochView {
                epoch,
                radii_n: &self.data.radii_n,
                theta_n: &self.params.theta_n,
                communities: &self.params.communities,
                link_nll: objective.link_nll,
                attr_nll: objective.attr_nll,
            })?;
        }

        Ok(EpochRecord {
            epoch,
            alpha: self.opts.alpha,
            link_nll: objective.link_nll,
            attr_nll: objective.attr_nll,
            l1_memb: objective.l1_memb,
            l1_weight: objective.l1_weight,
            total: objective.total,
            agreement,
        })
    }
}

fn log_breakdown(epoch: Option<usize>, alpha: f64, obj: &Objective, agreement: Option<f64>) {
    let label = match epoch {
        Some(e) => format!("epoch={}", e),
        None => "initial".to_string(),
    };
    info!(
        "{}, alpha={}, L_G={:.6}, L_X={:.6}, l1_F={:.6}, l1_W={:.6}, total_loss={:.6}",
        label, alpha, obj.link_nll, obj.attr_nll, obj.l1_memb, obj.l1_weight, obj.total
    );
    if let Some(score) = agreement {
        info!("{}, community_agreement={:.4}", label, score);
    }
}

/// Rescale a block gradient to unit norm when it exceeds the threshold.
/// Soft clipping: the descent direction is preserved.
fn soft_clip<D: ndarray::Dimension>(grad: &mut Array<f64, D>, max_norm: f64) {
    let norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
    if norm > max_norm {
        debug!("block gradient norm {:.3e} rescaled to unit norm", norm);
        grad.mapv_inplace(|g| g / norm);
    }
}

/// Apply `param -= lr * grad` and count entries whose sign flipped from
/// positive to non-positive.
fn step_counting_sign_crossings(
    params: &mut Array1<f64>,
    grad: &Array1<f64>,
    lr: f64,
) -> usize {
    let mut crossed = 0;
    ndarray::Zip::from(params).and(grad).for_each(|p, &g| {
        let updated = *p - lr * g;
        if *p > 0.0 && updated <= 0.0 {
            crossed += 1;
        }
        *p = updated;
    });
    crossed
}
