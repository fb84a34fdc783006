//! Cross-module checks on a small fixed instance: analytic gradients
//! against finite differences, trainer no-op and descent behaviour, and
//! pool/sequential dispatch equivalence.

use crate::config::{AttributeKind, FitOptions};
use crate::data::{Communities, NetworkData, Parameters};
use crate::dispatch::Dispatcher;
use crate::gradient::{
    community_angle_gradient, community_radius_gradient, community_spread_gradient,
    node_angle_gradient, weight_row_gradient,
};
use crate::likelihood::Objective;
use crate::snapshot::Snapshot;
use crate::trainer::{CommunityScorer, EpochView, EpochVisualizer, Trainer};
use approx::assert_relative_eq;
use ndarray::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn toy_instance(kind: AttributeKind) -> (NetworkData, Parameters, FitOptions) {
    let radii_n = array![0.8, 1.0, 1.2, 0.9];
    // 4-cycle: 0-1-2-3-0
    let adj_nn = array![
        [0.0, 1.0, 0.0, 1.0],
        [1.0, 0.0, 1.0, 0.0],
        [0.0, 1.0, 0.0, 1.0],
        [1.0, 0.0, 1.0, 0.0],
    ];
    let attr_nk = match kind {
        AttributeKind::Binary => array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]],
        AttributeKind::Real => array![[0.8, -0.2], [0.5, 0.1], [-0.3, 0.7], [0.2, 0.4]],
    };
    let data = NetworkData::new(radii_n, adj_nn, attr_nk, kind).unwrap();

    let params = Parameters {
        theta_n: array![0.3, 1.2, 3.1, 5.0],
        communities: Communities {
            radius_c: array![0.9, 1.1],
            angle_c: array![0.8, 4.2],
            spread_c: array![1.6, 1.9],
        },
        weight_kc: array![[0.05, -0.04, 0.02], [-0.03, 0.06, 0.01]],
    };

    let opts = FitOptions {
        num_communities: 2,
        num_epochs: 1,
        learning_rate: 1e-2,
        alpha: 0.4,
        lambda_memb: 0.01,
        lambda_weight: 0.02,
        attribute_kind: kind,
        ..Default::default()
    };

    (data, params, opts)
}

fn numeric_gradient<M>(
    data: &NetworkData,
    params: &Parameters,
    opts: &FitOptions,
    mutate: M,
) -> f64
where
    M: Fn(&mut Parameters, f64),
{
    let hh = 1e-6;
    let mut plus = params.clone();
    mutate(&mut plus, hh);
    let mut minus = params.clone();
    mutate(&mut minus, -hh);
    (Objective::evaluate(data, &plus, opts).total - Objective::evaluate(data, &minus, opts).total)
        / (2.0 * hh)
}

#[test]
fn node_angle_gradients_match_finite_differences() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let snap = Snapshot::new(&data, &params, &opts);
    for node in 0..data.num_nodes() {
        let analytic = node_angle_gradient(&snap, node).unwrap();
        let numeric = numeric_gradient(&data, &params, &opts, |p, h| p.theta_n[node] += h);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-9, max_relative = 1e-4);
    }
}

#[test]
fn community_radius_gradients_match_finite_differences() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let snap = Snapshot::new(&data, &params, &opts);
    for cc in 0..2 {
        let analytic = community_radius_gradient(&snap, cc).unwrap();
        let numeric =
            numeric_gradient(&data, &params, &opts, |p, h| p.communities.radius_c[cc] += h);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-9, max_relative = 1e-4);
    }
}

#[test]
fn community_angle_gradients_match_finite_differences() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let snap = Snapshot::new(&data, &params, &opts);
    for cc in 0..2 {
        let analytic = community_angle_gradient(&snap, cc).unwrap();
        let numeric =
            numeric_gradient(&data, &params, &opts, |p, h| p.communities.angle_c[cc] += h);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-9, max_relative = 1e-4);
    }
}

#[test]
fn community_spread_gradients_match_finite_differences() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let snap = Snapshot::new(&data, &params, &opts);
    for cc in 0..2 {
        let analytic = community_spread_gradient(&snap, cc).unwrap();
        let numeric =
            numeric_gradient(&data, &params, &opts, |p, h| p.communities.spread_c[cc] += h);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-9, max_relative = 1e-4);
    }
}

#[test]
fn decoder_gradients_match_finite_differences() {
    for kind in [AttributeKind::Binary, AttributeKind::Real] {
        let (data, params, opts) = toy_instance(kind);
        let snap = Snapshot::new(&data, &params, &opts);
        for kk in 0..data.num_attributes() {
            let analytic = weight_row_gradient(&snap, kk).unwrap();
            for jj in 0..3 {
                let numeric = numeric_gradient(&data, &params, &opts, |p, h| {
                    p.weight_kc[[kk, jj]] += h
                });
                assert_relative_eq!(analytic[jj], numeric, epsilon = 1e-9, max_relative = 1e-4);
            }
        }
    }
}

#[test]
fn node_angle_gradients_match_for_real_attributes() {
    let (data, params, opts) = toy_instance(AttributeKind::Real);
    let snap = Snapshot::new(&data, &params, &opts);
    for node in 0..data.num_nodes() {
        let analytic = node_angle_gradient(&snap, node).unwrap();
        let numeric = numeric_gradient(&data, &params, &opts, |p, h| p.theta_n[node] += h);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-9, max_relative = 1e-4);
    }
}

#[test]
fn zero_learning_rate_epoch_is_a_noop() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let opts = FitOptions {
        learning_rate: 0.0,
        num_epochs: 1,
        ..opts
    };
    let before = params.clone();
    let mut trainer = Trainer::new(&data, params, opts).unwrap();
    trainer.fit().unwrap();
    let after = trainer.params();
    assert_eq!(after.theta_n, before.theta_n);
    assert_eq!(after.communities.radius_c, before.communities.radius_c);
    assert_eq!(after.communities.angle_c, before.communities.angle_c);
    assert_eq!(after.communities.spread_c, before.communities.spread_c);
    assert_eq!(after.weight_kc, before.weight_kc);
}

#[test]
fn small_steps_do_not_increase_the_loss() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let opts = FitOptions {
        learning_rate: 1e-3,
        num_epochs: 20,
        alpha: 0.5,
        lambda_memb: 0.0,
        lambda_weight: 0.0,
        ..opts
    };
    let initial = Objective::evaluate(&data, &params, &opts).total;
    let mut trainer = Trainer::new(&data, params, opts).unwrap();
    let records = trainer.fit().unwrap();

    assert_eq!(records.len(), 20);
    let mut previous = initial;
    for record in &records {
        assert!(
            record.total <= previous + 1e-3,
            "loss rose from {} to {} at epoch {}",
            previous,
            record.total,
            record.epoch
        );
        previous = record.total;
    }
    assert!(records[19].total <= initial + 1e-6);
}

#[test]
fn pool_and_sequential_dispatch_agree_bitwise() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let snap = Snapshot::new(&data, &params, &opts);
    let sequential = Dispatcher::new(0).unwrap();
    let pooled = Dispatcher::new(3).unwrap();

    let seq_nodes = sequential
        .dispatch(&snap, data.num_nodes(), |t| node_angle_gradient(t.shared, t.unit))
        .unwrap();
    let par_nodes = pooled
        .dispatch(&snap, data.num_nodes(), |t| node_angle_gradient(t.shared, t.unit))
        .unwrap();
    assert_eq!(seq_nodes, par_nodes);

    let seq_radii = sequential
        .dispatch(&snap, 2, |t| community_radius_gradient(t.shared, t.unit))
        .unwrap();
    let par_radii = pooled
        .dispatch(&snap, 2, |t| community_radius_gradient(t.shared, t.unit))
        .unwrap();
    assert_eq!(seq_radii, par_radii);
}

struct OverlapScorer;

impl CommunityScorer for OverlapScorer {
    fn score(&self, truth: &[usize], predicted: &[usize]) -> f64 {
        let same = truth
            .iter()
            .zip(predicted.iter())
            .filter(|(a, b)| a == b)
            .count();
        same as f64 / truth.len() as f64
    }
}

struct CountingVisualizer(Arc<AtomicUsize>);

impl EpochVisualizer for CountingVisualizer {
    fn render(&self, view: &EpochView<'_>) -> anyhow::Result<()> {
        anyhow::ensure!(view.theta_n.len() == view.radii_n.len());
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn report_feeds_scorer_and_visualizer_each_epoch() {
    let (data, params, opts) = toy_instance(AttributeKind::Binary);
    let opts = FitOptions {
        num_epochs: 3,
        ..opts
    };
    let renders = Arc::new(AtomicUsize::new(0));
    let mut trainer = Trainer::new(&data, params, opts)
        .unwrap()
        .with_ground_truth(vec![0, 0, 1, 1], Box::new(OverlapScorer))
        .unwrap()
        .with_visualizer(Box::new(CountingVisualizer(renders.clone())));

    let records = trainer.fit().unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 3);
    for record in &records {
        let score = record.agreement.unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}
