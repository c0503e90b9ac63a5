use faer::{ColRef, MatRef};
use itertools::izip;

// Returns the cross product of two vectors
pub fn cross_product(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn vec_norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// View a column of length `nrows * ncols` as a column-major matrix without
/// copying. Used to pass dof vectors to operators that want a `[3][n_nodes]`
/// layout.
pub fn col_as_mat_ref(col: ColRef<'_, f64>, nrows: usize, ncols: usize) -> MatRef<'_, f64> {
    assert_eq!(col.nrows(), nrows * ncols);
    unsafe { MatRef::from_raw_parts(col.as_ptr(), nrows, ncols, 1, nrows as isize) }
}

/// Max-norm of the difference between two equally sized columns.
pub fn max_abs_diff(a: ColRef<f64>, b: ColRef<f64>) -> f64 {
    izip!(a.iter(), b.iter()).fold(0., |acc, (x, y)| acc.max((x - y).abs()))
}

/// True if every entry of the column is finite.
pub fn all_finite(a: ColRef<f64>) -> bool {
    a.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faer::col;

    #[test]
    fn test_cross_product() {
        let c = cross_product(&[1., 0., 0.], &[0., 1., 0.]);
        assert_relative_eq!(c[0], 0., epsilon = 1e-15);
        assert_relative_eq!(c[1], 0., epsilon = 1e-15);
        assert_relative_eq!(c[2], 1., epsilon = 1e-15);
    }

    #[test]
    fn test_max_abs_diff() {
        let a = col![1., 2., 3.];
        let b = col![1., 2.5, 2.];
        assert_relative_eq!(max_abs_diff(a.as_ref(), b.as_ref()), 1., epsilon = 1e-15);
    }

    #[test]
    fn test_col_as_mat_ref_is_column_major() {
        let c = col![1., 2., 3., 4., 5., 6.];
        let m = col_as_mat_ref(c.as_ref(), 3, 2);
        assert_relative_eq!(m[(0, 0)], 1., epsilon = 1e-15);
        assert_relative_eq!(m[(2, 0)], 3., epsilon = 1e-15);
        assert_relative_eq!(m[(0, 1)], 4., epsilon = 1e-15);
        assert_relative_eq!(m[(2, 1)], 6., epsilon = 1e-15);
    }
}
