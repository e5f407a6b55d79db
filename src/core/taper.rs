use ndarray::Array2;

/// Taper window applied to a subgrid before the Fourier transform to reduce
/// spectral leakage from the finite window extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Taper {
    /// No windowing
    None,
    /// Separable Hann (raised cosine) window along both axes
    #[default]
    Hanning,
}

impl Taper {
    /// Apply the taper in place. Separable: the 2D window is the outer
    /// product of the 1D window along rows and columns.
    pub fn apply(&self, subgrid: &mut Array2<f64>) {
        match self {
            Taper::None => {}
            Taper::Hanning => {
                let (ny, nx) = subgrid.dim();
                let wy = hanning(ny);
                let wx = hanning(nx);
                for ((j, i), v) in subgrid.indexed_iter_mut() {
                    *v *= wy[j] * wx[i];
                }
            }
        }
    }
}

/// Symmetric Hann window of length n: 0.5 - 0.5*cos(2*pi*i/(n-1))
pub fn hanning(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hanning_endpoints() {
        let w = hanning(64);
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(w[63], 0.0, epsilon = 1e-12);
        // symmetric about the middle
        assert_relative_eq!(w[1], w[62], epsilon = 1e-12);
    }

    #[test]
    fn test_hanning_single_point() {
        assert_eq!(hanning(1), vec![1.0]);
    }

    #[test]
    fn test_none_leaves_data_unchanged() {
        let mut sub = Array2::from_elem((8, 8), 3.0);
        Taper::None.apply(&mut sub);
        assert!(sub.iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_hanning_zeroes_edges() {
        let mut sub = Array2::from_elem((8, 8), 1.0);
        Taper::Hanning.apply(&mut sub);
        assert_relative_eq!(sub[[0, 4]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(sub[[4, 0]], 0.0, epsilon = 1e-12);
        assert!(sub[[4, 4]] > 0.5);
    }
}
