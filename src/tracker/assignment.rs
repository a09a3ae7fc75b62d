// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Minimum-cost linear assignment (Hungarian method with potentials).

/// Cost used in place of NaN or infinite entries.
const INVALID_COST: f64 = 1e9;

/// Solve a rectangular assignment problem.
///
/// `cost[i][j]` is the cost of assigning row `i` to column `j`. Every row is
/// assigned when there are at least as many columns, and vice versa. Returns
/// `(row, col)` pairs sorted by row.
#[must_use]
pub fn linear_assignment(cost: &[Vec<f32>]) -> Vec<(usize, usize)> {
    let rows = cost.len();
    let cols = cost.first().map_or(0, Vec::len);
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    let at = |i: usize, j: usize| -> f64 {
        let v = f64::from(cost[i].get(j).copied().unwrap_or(f32::NAN));
        if v.is_finite() { v } else { INVALID_COST }
    };

    let mut pairs = if rows <= cols {
        solve(rows, cols, at)
    } else {
        solve(cols, rows, |i, j| at(j, i))
            .into_iter()
            .map(|(c, r)| (r, c))
            .collect()
    };
    pairs.sort_unstable();
    pairs
}

/// Hungarian algorithm for `n <= m`, 1-based internally.
fn solve(n: usize, m: usize, cost: impl Fn(usize, usize) -> f64) -> Vec<(usize, usize)> {
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    // p[j]: row matched to column j (0 = none)
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    (1..=m)
        .filter(|&j| p[j] != 0)
        .map(|j| (p[j] - 1, j - 1))
        .collect()
}
