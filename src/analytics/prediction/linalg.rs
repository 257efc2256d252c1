//! Ridge least squares
//!
//! 正規方程式 (XᵀX + diag(λ)) β = Xᵀy をコレスキー分解で解く

use ndarray::{Array1, Array2};

/// リッジ回帰の係数を求める（正定値でなければ None）
pub fn solve_ridge(x: &Array2<f64>, y: &Array1<f64>, penalties: &[f64]) -> Option<Array1<f64>> {
    debug_assert_eq!(x.ncols(), penalties.len());

    let mut gram = x.t().dot(x);
    for (i, penalty) in penalties.iter().enumerate() {
        gram[[i, i]] += penalty;
    }
    let rhs = x.t().dot(y);

    cholesky_solve(&gram, &rhs)
}

/// 対称正定値行列の連立方程式を解く
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // Lᵀ β = z
    let mut beta = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * beta[k];
        }
        beta[i] = sum / l[[i, i]];
    }

    Some(beta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();
        // 4x + 2y = 2, 2x + 3y = 1 -> x = 0.5, y = 0
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_not_positive_definite() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(cholesky_solve(&a, &array![1.0, 1.0]).is_none());
    }

    #[test]
    fn test_solve_ridge_recovers_line() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let beta = solve_ridge(&x, &y, &[1e-10, 1e-10]).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-6);
        assert!((beta[1] - 2.0).abs() < 1e-6);
    }
}
