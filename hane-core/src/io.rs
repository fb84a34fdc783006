//! Flat comma-separated tables for trained parameters.
//!
//! Three tables, no header row, no index column: node angles as a single
//! column of N lines, community centres as a 3 x C table (radius, angle,
//! spread rows), decoder weights as K x (C+1). Values are written with
//! `Display`, which round-trips `f64` exactly.

use crate::data::Communities;
use anyhow::{ensure, Context};
use ndarray::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

fn write_lines(lines: &[String], path: &str) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path))?;
    let mut buf = BufWriter::new(file);
    for line in lines {
        writeln!(buf, "{}", line)?;
    }
    buf.flush()?;
    Ok(())
}

fn read_table(path: &str) -> anyhow::Result<Vec<Vec<f64>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path))?;
    let buf = BufReader::new(file);
    let mut rows = Vec::new();
    for (lineno, line) in buf.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|word| {
                word.trim()
                    .parse::<f64>()
                    .with_context(|| format!("{}:{}: bad value {:?}", path, lineno + 1, word))
            })
            .collect::<anyhow::Result<Vec<f64>>>()?;
        rows.push(row);
    }
    ensure!(!rows.is_empty(), "no data in {}", path);
    let width = rows[0].len();
    ensure!(
        rows.iter().all(|r| r.len() == width),
        "ragged rows in {}",
        path
    );
    Ok(rows)
}

fn join_row<'r>(row: impl Iterator<Item = &'r f64>) -> String {
    row.map(|x| format!("{}", x)).collect::<Vec<_>>().join(",")
}

/// Write a vector as one value per line.
pub fn write_vector(values: &Array1<f64>, path: &str) -> anyhow::Result<()> {
    let lines: Vec<String> = values.iter().map(|x| format!("{}", x)).collect();
    write_lines(&lines, path)
}

/// Read a single-column table back into a vector.
pub fn read_vector(path: &str) -> anyhow::Result<Array1<f64>> {
    let rows = read_table(path)?;
    ensure!(
        rows[0].len() == 1,
        "expected a single column in {}, found {}",
        path,
        rows[0].len()
    );
    Ok(rows.into_iter().map(|r| r[0]).collect())
}

/// Write community centres as a 3 x C table: radius, angle, spread rows.
pub fn write_communities(communities: &Communities, path: &str) -> anyhow::Result<()> {
    let lines = vec![
        join_row(communities.radius_c.iter()),
        join_row(communities.angle_c.iter()),
        join_row(communities.spread_c.iter()),
    ];
    write_lines(&lines, path)
}

/// Read a 3 x C community table back.
pub fn read_communities(path: &str) -> anyhow::Result<Communities> {
    let rows = read_table(path)?;
    ensure!(
        rows.len() == 3,
        "expected 3 rows (radius, angle, spread) in {}, found {}",
        path,
        rows.len()
    );
    let mut rows = rows.into_iter();
    Ok(Communities {
        radius_c: rows.next().map(Array1::from_vec).unwrap(),
        angle_c: rows.next().map(Array1::from_vec).unwrap(),
        spread_c: rows.next().map(Array1::from_vec).unwrap(),
    })
}

/// Write a matrix row by row.
pub fn write_matrix(mat: &Array2<f64>, path: &str) -> anyhow::Result<()> {
    let lines: Vec<String> = mat.rows().into_iter().map(|r| join_row(r.iter())).collect();
    write_lines(&lines, path)
}

/// Read a rectangular table back into a matrix.
pub fn read_matrix(path: &str) -> anyhow::Result<Array2<f64>> {
    let rows = read_table(path)?;
    let (nrows, ncols) = (rows.len(), rows[0].len());
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((nrows, ncols), flat)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn tables_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut draw = |n: usize| Array1::from_shape_fn(n, |_| rng.random::<f64>() * 10.0 - 5.0);

        let theta = draw(5);
        let communities = Communities {
            radius_c: draw(3),
            angle_c: draw(3),
            spread_c: draw(3),
        };
        let weight = Array2::from_shape_fn((4, 4), |_| rng.random::<f64>() * 2.0 - 1.0);

        let theta_path = dir.path().join("thetas.csv");
        let m_path = dir.path().join("M.csv");
        let w_path = dir.path().join("W.csv");

        write_vector(&theta, theta_path.to_str().unwrap()).unwrap();
        write_communities(&communities, m_path.to_str().unwrap()).unwrap();
        write_matrix(&weight, w_path.to_str().unwrap()).unwrap();

        assert_eq!(read_vector(theta_path.to_str().unwrap()).unwrap(), theta);
        let back = read_communities(m_path.to_str().unwrap()).unwrap();
        assert_eq!(back.radius_c, communities.radius_c);
        assert_eq!(back.angle_c, communities.angle_c);
        assert_eq!(back.spread_c, communities.spread_c);
        assert_eq!(read_matrix(w_path.to_str().unwrap()).unwrap(), weight);
    }

    #[test]
    fn rejects_ragged_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "1.0,2.0\n3.0\n").unwrap();
        assert!(read_matrix(path.to_str().unwrap()).is_err());
    }
}
