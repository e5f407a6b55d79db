use crate::types::{CurieError, CurieResult};

/// Straight-line fit y = slope * x + intercept with the slope's standard
/// deviation taken from the fit covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    pub slope_stdev: f64,
}

/// Weighted least-squares line fit with inverse-variance weighting.
///
/// `sigma` holds the per-point standard errors; the covariance is absolute
/// (not rescaled by the residual chi-square), matching a fit that trusts the
/// supplied errors. Singular systems and non-finite weights are reported as
/// `DegenerateSpectrum` so the per-centroid boundary can degrade to NaN.
pub fn wls_line_fit(x: &[f64], y: &[f64], sigma: &[f64]) -> CurieResult<LineFit> {
    if x.len() != y.len() || x.len() != sigma.len() {
        return Err(CurieError::Processing(format!(
            "fit input lengths differ: x={}, y={}, sigma={}",
            x.len(),
            y.len(),
            sigma.len()
        )));
    }
    if x.len() < 2 {
        return Err(CurieError::DegenerateSpectrum(
            "line fit needs at least 2 points".into(),
        ));
    }

    let mut s = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((&xi, &yi), &si) in x.iter().zip(y).zip(sigma) {
        let w = 1.0 / (si * si);
        if !w.is_finite() || !xi.is_finite() || !yi.is_finite() {
            return Err(CurieError::DegenerateSpectrum(
                "non-finite value in weighted fit".into(),
            ));
        }
        s += w;
        sx += w * xi;
        sy += w * yi;
        sxx += w * xi * xi;
        sxy += w * xi * yi;
    }

    let delta = s * sxx - sx * sx;
    if !(delta > 0.0) || !delta.is_finite() {
        return Err(CurieError::DegenerateSpectrum(
            "singular weighted fit system".into(),
        ));
    }

    Ok(LineFit {
        slope: (s * sxy - sx * sy) / delta,
        intercept: (sxx * sy - sx * sxy) / delta,
        slope_stdev: (s / delta).sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line_recovered() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|x| -3.5 * x + 2.0).collect();
        let sigma = vec![0.1; 10];

        let fit = wls_line_fit(&x, &y, &sigma).unwrap();
        assert_relative_eq!(fit.slope, -3.5, epsilon = 1e-10);
        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-10);
        assert!(fit.slope_stdev > 0.0);
    }

    #[test]
    fn test_inverse_variance_weighting() {
        // two populations on different lines; the tight-sigma one dominates
        let x = vec![0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0];
        let mut y: Vec<f64> = x[..4].iter().map(|x| 2.0 * x).collect();
        y.extend(x[4..].iter().map(|x| -2.0 * x));
        let mut sigma = vec![0.01; 4];
        sigma.extend(vec![100.0; 4]);

        let fit = wls_line_fit(&x, &y, &sigma).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_uncertainty_scales_with_sigma() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|x| x + 1.0).collect();

        let tight = wls_line_fit(&x, &y, &vec![0.1; 20]).unwrap();
        let loose = wls_line_fit(&x, &y, &vec![1.0; 20]).unwrap();
        assert_relative_eq!(loose.slope_stdev, 10.0 * tight.slope_stdev, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_system_rejected() {
        // all x identical: slope is unconstrained
        let x = vec![1.0; 5];
        let y = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let sigma = vec![0.5; 5];
        assert!(matches!(
            wls_line_fit(&x, &y, &sigma),
            Err(CurieError::DegenerateSpectrum(_))
        ));
    }

    #[test]
    fn test_zero_sigma_rejected() {
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![0.0, 1.0, 2.0];
        let sigma = vec![0.0, 1.0, 1.0];
        assert!(wls_line_fit(&x, &y, &sigma).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let err = wls_line_fit(&[0.0, 1.0], &[0.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, CurieError::Processing(_)));
    }
}
