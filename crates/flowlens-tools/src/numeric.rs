//! Shared numeric kernel: descriptive statistics, correlation, linear
//! fits, and seeded k-means.
//!
//! Everything here is deterministic; the stochastic pieces (k-means
//! initialization, subsampling) take an explicit seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Default seed for every stochastic routine.
pub const DEFAULT_SEED: u64 = 42;

/// Drop nulls and non-finite values.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Quantile with linear interpolation on a pre-sorted slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let low = pos.floor() as usize;
    let high = pos.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let frac = pos - low as f64;
        sorted[low] * (1.0 - frac) + sorted[high] * frac
    }
}

pub fn median(sorted: &[f64]) -> f64 {
    quantile(sorted, 0.5)
}

/// Pearson correlation over paired values; `None` when undefined
/// (fewer than 2 pairs, or zero variance on either side).
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Spearman rank correlation: Pearson over average-tied ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let rx = ranks(&x[..n]);
    let ry = ranks(&y[..n]);
    pearson(&rx, &ry)
}

fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Average rank across ties; ranks are 1-based.
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            out[idx] = rank;
        }
        i = j + 1;
    }
    out
}

/// Slope of the least-squares line through `(0, y[0]) .. (n-1, y[n-1])`.
pub fn linear_slope(y: &[f64]) -> f64 {
    if y.len() < 2 {
        return 0.0;
    }
    let n = y.len() as f64;
    let mx = (n - 1.0) / 2.0;
    let my = mean(y);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, v) in y.iter().enumerate() {
        let dx = i as f64 - mx;
        num += dx * (v - my);
        den += dx * dx;
    }
    num / den
}

/// Z-score standardization per feature column. Zero-variance features map
/// to all zeros so they cannot dominate the distance metric.
pub fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    if rows.is_empty() {
        return Vec::new();
    }
    let dims = rows[0].len();
    let mut means = vec![0.0; dims];
    let mut stds = vec![0.0; dims];
    for d in 0..dims {
        let column: Vec<f64> = rows.iter().map(|r| r[d]).collect();
        means[d] = mean(&column);
        let s = std_dev(&column);
        stds[d] = if s.is_finite() && s > 0.0 { s } else { 1.0 };
    }
    rows.iter()
        .map(|r| {
            r.iter()
                .enumerate()
                .map(|(d, v)| (v - means[d]) / stds[d])
                .collect()
        })
        .collect()
}

/// K-means output.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

/// Lloyd's algorithm with seeded random initialization.
///
/// Deterministic given identical rows, `k`, and `seed`.
pub fn kmeans(rows: &[Vec<f64>], k: usize, seed: u64) -> KMeansFit {
    assert!(k >= 1, "k must be at least 1");
    let k = k.min(rows.len().max(1));
    if rows.is_empty() {
        return KMeansFit {
            assignments: Vec::new(),
            centroids: Vec::new(),
            inertia: 0.0,
        };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<Vec<f64>> = indices[..k].iter().map(|&i| rows[i].clone()).collect();

    let mut assignments = vec![0usize; rows.len()];
    for _ in 0..100 {
        let mut changed = false;
        for (i, row) in rows.iter().enumerate() {
            let nearest = nearest_centroid(row, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        let dims = rows[0].len();
        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (i, row) in rows.iter().enumerate() {
            counts[assignments[i]] += 1;
            for d in 0..dims {
                sums[assignments[i]][d] += row[d];
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for d in 0..dims {
                    centroids[c][d] = sums[c][d] / counts[c] as f64;
                }
            }
            // Empty clusters keep their previous centroid.
        }

        if !changed {
            break;
        }
    }

    let inertia = rows
        .iter()
        .enumerate()
        .map(|(i, row)| squared_distance(row, &centroids[assignments[i]]))
        .sum();

    KMeansFit {
        assignments,
        centroids,
        inertia,
    }
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(row, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Pick k via the inertia elbow over 2..=10: the smallest k whose
/// marginal inertia reduction drops below 15%.
pub fn elbow_k(rows: &[Vec<f64>], seed: u64) -> usize {
    let max_k = 10.min(rows.len().max(2));
    let mut previous = f64::INFINITY;
    let mut chosen = 2;
    for k in 2..=max_k {
        let fit = kmeans(rows, k, seed);
        if previous.is_finite() {
            let improvement = (previous - fit.inertia) / previous.max(f64::EPSILON);
            if improvement < 0.15 {
                return chosen;
            }
        }
        chosen = k;
        previous = fit.inertia;
    }
    chosen
}

/// Deterministic sample of `n` row indices.
pub fn sample_indices(total: usize, n: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..total).collect();
    if n >= total {
        return indices;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices.truncate(n);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-9);
        // Sample std of this classic set is ~2.138.
        assert!((std_dev(&values) - 2.13809).abs() < 1e-4);
    }

    #[test]
    fn quantile_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(quantile(&sorted, 0.25), 2.0);
        assert_eq!(quantile(&sorted, 0.75), 4.0);
        assert_eq!(median(&sorted), 3.0);

        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-9);
    }

    #[test]
    fn pearson_identical_columns_is_one() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let r = pearson(&x, &x).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_inverse_is_minus_one() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [4.0, 3.0, 2.0, 1.0];
        let r = pearson(&x, &y).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_zero_variance_is_undefined() {
        let x = [1.0, 1.0, 1.0];
        let y = [1.0, 2.0, 3.0];
        assert!(pearson(&x, &y).is_none());
    }

    #[test]
    fn spearman_monotonic_is_one() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 10.0, 100.0, 1000.0];
        let r = spearman(&x, &y).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ranks_average_ties() {
        let r = ranks(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(r, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn linear_slope_direction() {
        assert!(linear_slope(&[1.0, 2.0, 3.0, 4.0]) > 0.0);
        assert!(linear_slope(&[4.0, 3.0, 2.0, 1.0]) < 0.0);
        assert!((linear_slope(&[0.0, 2.0, 4.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn kmeans_is_deterministic_for_a_seed() {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                if i < 30 {
                    vec![i as f64 * 0.01, 0.0]
                } else {
                    vec![100.0 + i as f64 * 0.01, 5.0]
                }
            })
            .collect();
        let a = kmeans(&rows, 2, DEFAULT_SEED);
        let b = kmeans(&rows, 2, DEFAULT_SEED);
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn kmeans_separates_obvious_clusters() {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                if i % 2 == 0 {
                    vec![0.0 + (i as f64) * 1e-3]
                } else {
                    vec![1000.0 + (i as f64) * 1e-3]
                }
            })
            .collect();
        let fit = kmeans(&rows, 2, DEFAULT_SEED);
        // All even rows share one cluster, all odd rows share the other.
        let even = fit.assignments[0];
        let odd = fit.assignments[1];
        assert_ne!(even, odd);
        for (i, &c) in fit.assignments.iter().enumerate() {
            assert_eq!(c, if i % 2 == 0 { even } else { odd });
        }
    }

    #[test]
    fn standardize_centers_features() {
        let rows = vec![vec![1.0, 100.0], vec![2.0, 200.0], vec![3.0, 300.0]];
        let scaled = standardize(&rows);
        for d in 0..2 {
            let column: Vec<f64> = scaled.iter().map(|r| r[d]).collect();
            assert!(mean(&column).abs() < 1e-12);
        }
    }

    #[test]
    fn sample_indices_deterministic_and_bounded() {
        let a = sample_indices(1000, 10, DEFAULT_SEED);
        let b = sample_indices(1000, 10, DEFAULT_SEED);
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(sample_indices(5, 10, DEFAULT_SEED).len(), 5);
    }
}
