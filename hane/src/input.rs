//! Loaders: edge lists, attribute tables, ground-truth labels, and the
//! spectral angular ordering.
//!
//! The model is fit on the largest connected component. Node radii come
//! from degree rank under a power-law exponent `gamma`:
//!
//! ```text
//! beta = 1 / (gamma - 1)
//! R[rank] = 2 beta ln(rank + 1) + 2 (1 - beta) ln N
//! ```
//!
//! so the best-connected node sits closest to the origin.

use anyhow::{ensure, Context};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::prelude::*;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// One network restricted to its largest connected component.
pub struct LoadedGraph {
    /// Degree-rank radial coordinates, positive.
    pub radii_n: Array1<f64>,
    /// Dense symmetric 0/1 adjacency, zero diagonal.
    pub adj_nn: Array2<f64>,
    /// Original node ids of the kept component, in new index order.
    pub kept: Vec<usize>,
}

fn data_lines(path: &str) -> anyhow::Result<Vec<(usize, String)>> {
    let file = File::open(path).with_context(|| format!("opening {}", path))?;
    let mut lines = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
            continue;
        }
        lines.push((lineno + 1, trimmed.to_string()));
    }
    Ok(lines)
}

fn split_tokens(line: &str) -> Vec<&str> {
    line.split([',', '\t', ' '])
        .filter(|w| !w.is_empty())
        .collect()
}

fn read_edge_pairs(path: &str) -> anyhow::Result<Vec<(usize, usize)>> {
    let mut edges = Vec::new();
    for (lineno, line) in data_lines(path)? {
        let words = split_tokens(&line);
        ensure!(
            words.len() >= 2,
            "{}:{}: expected an edge pair, got {:?}",
            path,
            lineno,
            line
        );
        let uu = words[0]
            .parse::<usize>()
            .with_context(|| format!("{}:{}: bad node id {:?}", path, lineno, words[0]))?;
        let vv = words[1]
            .parse::<usize>()
            .with_context(|| format!("{}:{}: bad node id {:?}", path, lineno, words[1]))?;
        edges.push((uu, vv));
    }
    ensure!(!edges.is_empty(), "no edges in {}", path);
    Ok(edges)
}

fn largest_component(neighbours: &[Vec<usize>]) -> Vec<usize> {
    let nn = neighbours.len();
    let mut component = vec![usize::MAX; nn];
    let mut sizes = Vec::new();

    for start in 0..nn {
        if component[start] != usize::MAX {
            continue;
        }
        let id = sizes.len();
        let mut size = 0;
        let mut queue = VecDeque::from([start]);
        component[start] = id;
        while let Some(node) = queue.pop_front() {
            size += 1;
            for &next in &neighbours[node] {
                if component[next] == usize::MAX {
                    component[next] = id;
                    queue.push_back(next);
                }
            }
        }
        sizes.push(size);
    }

    let best = sizes
        .iter()
        .enumerate()
        .max_by_key(|&(_, &s)| s)
        .map(|(id, _)| id)
        .unwrap_or(0);
    (0..nn).filter(|&v| component[v] == best).collect()
}

/// Read an edge list, keep the largest connected component, and derive
/// degree-rank radii.
pub fn load_graph(path: &str, gamma: f64) -> anyhow::Result<LoadedGraph> {
    ensure!(
        gamma > 2.0,
        "power-law exponent must exceed 2 for positive radii, got {}",
        gamma
    );

    let edges = read_edge_pairs(path)?;
    let n_raw = edges.iter().map(|&(u, v)| u.max(v)).max().unwrap_or(0) + 1;

    let mut neighbours = vec![Vec::new(); n_raw];
    for &(uu, vv) in &edges {
        if uu != vv {
            neighbours[uu].push(vv);
            neighbours[vv].push(uu);
        }
    }

    let kept = largest_component(&neighbours);
    let nn = kept.len();
    ensure!(nn >= 3, "largest component has only {} nodes", nn);

    let mut new_index = vec![usize::MAX; n_raw];
    for (pos, &orig) in kept.iter().enumerate() {
        new_index[orig] = pos;
    }

    let mut adj_nn = Array2::zeros((nn, nn));
    for &orig in &kept {
        let ii = new_index[orig];
        for &other in &neighbours[orig] {
            adj_nn[[ii, new_index[other]]] = 1.0;
        }
    }

    let degree_n: Vec<f64> = (0..nn).map(|ii| adj_nn.row(ii).sum()).collect();

    // degree-descending rank, ties broken by node index
    let mut by_degree: Vec<usize> = (0..nn).collect();
    by_degree.sort_by(|&a, &b| degree_n[b].total_cmp(&degree_n[a]).then(a.cmp(&b)));
    let mut rank_n = vec![0usize; nn];
    for (pos, &node) in by_degree.iter().enumerate() {
        rank_n[node] = pos;
    }

    let beta = 1.0 / (gamma - 1.0);
    let log_n = (nn as f64).ln();
    let radii_n = Array1::from_shape_fn(nn, |ii| {
        2.0 * beta * ((rank_n[ii] + 1) as f64).ln() + 2.0 * (1.0 - beta) * log_n
    });

    Ok(LoadedGraph {
        radii_n,
        adj_nn,
        kept,
    })
}

/// Angular ordering from the graph Laplacian: sort nodes by the angle of
/// their coordinates in the second and third smallest eigenvectors.
pub fn spectral_ordering(adj_nn: &Array2<f64>) -> anyhow::Result<Vec<usize>> {
    let nn = adj_nn.nrows();
    ensure!(nn >= 3, "spectral ordering needs at least 3 nodes");

    let mut lap = DMatrix::<f64>::zeros(nn, nn);
    for ii in 0..nn {
        let mut degree = 0.0;
        for jj in 0..nn {
            let a = adj_nn[[ii, jj]];
            degree += a;
            lap[(ii, jj)] = -a;
        }
        lap[(ii, ii)] += degree;
    }

    let eigen = SymmetricEigen::new(lap);
    let mut by_value: Vec<usize> = (0..nn).collect();
    by_value.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let v1 = eigen.eigenvectors.column(by_value[1]);
    let v2 = eigen.eigenvectors.column(by_value[2]);
    let angles: Vec<f64> = (0..nn).map(|ii| v2[ii].atan2(v1[ii])).collect();

    let mut order: Vec<usize> = (0..nn).collect();
    order.sort_by(|&a, &b| angles[a].total_cmp(&angles[b]));
    Ok(order)
}

/// Read a numeric attribute table (comma, tab, or space separated), one
/// row per original node id, and keep the component's rows.
pub fn load_attributes(path: &str, kept: &[usize]) -> anyhow::Result<Array2<f64>> {
    let mut rows = Vec::new();
    for (lineno, line) in data_lines(path)? {
        let row = split_tokens(&line)
            .iter()
            .map(|word| {
                word.parse::<f64>()
                    .with_context(|| format!("{}:{}: bad value {:?}", path, lineno, word))
            })
            .collect::<anyhow::Result<Vec<f64>>>()?;
        rows.push(row);
    }
    ensure!(!rows.is_empty(), "no attribute rows in {}", path);
    let width = rows[0].len();
    ensure!(
        width > 0 && rows.iter().all(|r| r.len() == width),
        "ragged attribute table in {}",
        path
    );
    ensure!(
        kept.iter().all(|&id| id < rows.len()),
        "attribute table in {} has {} rows, network needs node id {}",
        path,
        rows.len(),
        kept.iter().max().copied().unwrap_or(0)
    );

    Ok(Array2::from_shape_fn((kept.len(), width), |(ii, jj)| {
        rows[kept[ii]][jj]
    }))
}

/// Read ground-truth community labels and keep the component's rows.
/// Accepts either one label per line (row = node id) or "id label" pairs.
pub fn load_labels(path: &str, kept: &[usize]) -> anyhow::Result<Vec<usize>> {
    let lines = data_lines(path)?;
    ensure!(!lines.is_empty(), "no labels in {}", path);

    let paired = split_tokens(&lines[0].1).len() >= 2;
    let mut labels = Vec::new();
    if paired {
        let max_id = kept.iter().max().copied().unwrap_or(0);
        let mut by_id = vec![None; max_id + 1];
        for (lineno, line) in &lines {
            let words = split_tokens(line);
            ensure!(
                words.len() >= 2,
                "{}:{}: expected \"id label\"",
                path,
                lineno
            );
            let id = words[0]
                .parse::<usize>()
                .with_context(|| format!("{}:{}: bad node id", path, lineno))?;
            let label = words[1]
                .parse::<usize>()
                .with_context(|| format!("{}:{}: bad label", path, lineno))?;
            if id <= max_id {
                by_id[id] = Some(label);
            }
        }
        for &id in kept {
            match by_id[id] {
                Some(label) => labels.push(label),
                None => anyhow::bail!("{}: no label for node {}", path, id),
            }
        }
    } else {
        let mut all = Vec::new();
        for (lineno, line) in &lines {
            all.push(line.parse::<usize>().with_context(|| {
                format!("{}:{}: bad label {:?}", path, lineno, line)
            })?);
        }
        ensure!(
            kept.iter().all(|&id| id < all.len()),
            "{} has {} labels, network needs node id {}",
            path,
            all.len(),
            kept.iter().max().copied().unwrap_or(0)
        );
        labels = kept.iter().map(|&id| all[id]).collect();
    }
    Ok(labels)
}
