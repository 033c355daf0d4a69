//! Small dense solvers backing the local surrogate fit.

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
///
/// A column whose best pivot is exactly zero is left unsolved and its
/// coefficient comes back as 0, so singular systems never produce NaN or
/// infinity.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    debug_assert!(a.len() == n && a.iter().all(|row| row.len() == n));

    for col in 0..n {
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if a[row][col].abs() > a[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if a[pivot_row][col] == 0.0 {
            continue;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        if a[row][row] == 0.0 {
            continue;
        }
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    x
}

/// Coefficients and goodness of fit of a weighted least squares model.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedFit {
    /// One coefficient per design column.
    pub coefficients: Vec<f64>,
    /// Weighted R^2 against the weighted mean baseline.
    pub r_squared: f64,
}

impl WeightedFit {
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(row)
            .map(|(beta, v)| beta * v)
            .sum()
    }
}

/// Residual variance below this is treated as a constant target.
const CONSTANT_TARGET_TOLERANCE: f64 = 1e-12;

/// Fit `y ~ design * beta` minimizing `sum w_i (y_i - design_i . beta)^2`.
///
/// Solves the normal equations `(X^T W X) beta = X^T W y`. The design matrix
/// must already contain an intercept column if one is wanted.
pub fn weighted_least_squares(design: &[Vec<f64>], targets: &[f64], weights: &[f64]) -> WeightedFit {
    let p = design.first().map_or(0, Vec::len);
    let mut xtwx = vec![vec![0.0; p]; p];
    let mut xtwy = vec![0.0; p];

    for ((row, &y), &w) in design.iter().zip(targets).zip(weights) {
        for i in 0..p {
            xtwy[i] += w * row[i] * y;
            for j in 0..p {
                xtwx[i][j] += w * row[i] * row[j];
            }
        }
    }

    let fit = WeightedFit {
        coefficients: solve_linear_system(xtwx, xtwy),
        r_squared: 0.0,
    };
    let fitted: Vec<f64> = design.iter().map(|row| fit.predict(row)).collect();
    WeightedFit {
        r_squared: weighted_r_squared(targets, &fitted, weights),
        ..fit
    }
}

/// `1 - ss_res / ss_tot` with weighted sums; 0 when the target is constant.
pub fn weighted_r_squared(targets: &[f64], fitted: &[f64], weights: &[f64]) -> f64 {
    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let mean = targets.iter().zip(weights).map(|(y, w)| w * y).sum::<f64>() / total_weight;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for ((y, y_hat), w) in targets.iter().zip(fitted).zip(weights) {
        ss_res += w * (y - y_hat).powi(2);
        ss_tot += w * (y - mean).powi(2);
    }

    if ss_tot <= CONSTANT_TARGET_TOLERANCE * total_weight {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_solve_identity() {
        let a = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(solve_linear_system(a, vec![3.0, -2.0]), vec![3.0, -2.0]);
    }

    #[test]
    fn test_solve_requires_pivoting() {
        // Zero on the leading diagonal forces a row swap.
        let a = vec![
            vec![0.0, 2.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![2.0, 0.0, 3.0],
        ];
        let x = solve_linear_system(a, vec![7.0, 3.0, 11.0]);
        assert!(close(x[0], 1.0), "{x:?}");
        assert!(close(x[1], 2.0), "{x:?}");
        assert!(close(x[2], 3.0), "{x:?}");
    }

    #[test]
    fn test_singular_column_yields_zero_coefficient() {
        let a = vec![
            vec![2.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.0, 4.0],
        ];
        let x = solve_linear_system(a, vec![4.0, 0.0, 8.0]);
        assert_eq!(x, vec![2.0, 0.0, 2.0]);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_all_zero_system() {
        let x = solve_linear_system(vec![vec![0.0; 3]; 3], vec![0.0; 3]);
        assert_eq!(x, vec![0.0; 3]);
    }

    #[test]
    fn test_wls_recovers_linear_function() {
        let mut design = Vec::new();
        let mut targets = Vec::new();
        let mut weights = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                let (x, y) = (i as f64 * 0.3 - 0.6, j as f64 * 0.2 - 0.4);
                design.push(vec![1.0, x, y]);
                targets.push(0.5 + 2.0 * x - 1.5 * y);
                weights.push(1.0 / (1.0 + (i + j) as f64));
            }
        }
        let fit = weighted_least_squares(&design, &targets, &weights);
        assert!(close(fit.coefficients[0], 0.5));
        assert!(close(fit.coefficients[1], 2.0));
        assert!(close(fit.coefficients[2], -1.5));
        assert!(close(fit.r_squared, 1.0));
    }

    #[test]
    fn test_r_squared_constant_target_is_zero() {
        let targets = [0.8; 4];
        let fitted = [0.8; 4];
        assert_eq!(weighted_r_squared(&targets, &fitted, &[1.0; 4]), 0.0);
    }

    #[test]
    fn test_r_squared_can_go_negative() {
        let targets = [0.0, 1.0, 0.0, 1.0];
        let fitted = [1.0, 0.0, 1.0, 0.0];
        assert!(weighted_r_squared(&targets, &fitted, &[1.0; 4]) < 0.0);
    }
}
