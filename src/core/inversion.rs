use crate::core::grid::{nan_fraction, CurieGrid};
use crate::core::spectrum::SpectrumModel;
use crate::core::taper::Taper;
use crate::core::fit::wls_line_fit;
use crate::types::{
    BatchResult, CpdResult, CurieError, CurieResult, FitRange, InversionResult,
};
use ndarray::Array2;
use std::f64::consts::PI;
use std::sync::Arc;

/// Optional subgrid post-processing step run between extraction and
/// inversion (detrending, unit conversion, ...). Identity when absent.
pub type SubgridHook = Arc<dyn Fn(Array2<f64>) -> Array2<f64> + Send + Sync>;

/// Spectral inversion parameters
#[derive(Debug, Clone)]
pub struct InversionParams {
    /// Wavenumber bounds for the top-depth fit (cycles/km)
    pub zt_range: (f64, f64),
    /// Wavenumber bounds for the centroid-depth fit (cycles/km)
    pub z0_range: (f64, f64),
    /// Taper applied before the Fourier transform
    pub taper: Taper,
    /// Power spectrum scaling exponent (1 = amplitude-style log scaling)
    pub power: f64,
    /// Reject windows whose missing-cell fraction reaches this threshold
    pub nan_fraction: f64,
    /// Spectrum-calculation strategy (Tanaka or Bansal)
    pub model: SpectrumModel,
    /// Worker cap for batch runs; None uses available parallelism
    pub max_workers: Option<usize>,
}

impl Default for InversionParams {
    fn default() -> Self {
        Self {
            zt_range: (0.2, 0.3),
            z0_range: (0.0, 0.1),
            taper: Taper::Hanning,
            power: 1.0,
            nan_fraction: 0.5,
            model: SpectrumModel::Tanaka,
            max_workers: None,
        }
    }
}

/// Sliding-window spectral inversion over a magnetic grid.
///
/// Holds a read-only reference to the parent grid; per-centroid computations
/// share no mutable state, so batches parallelise freely.
pub struct CurieInversion<'a> {
    grid: &'a CurieGrid,
    params: InversionParams,
    subgrid_hook: Option<SubgridHook>,
}

impl<'a> CurieInversion<'a> {
    /// Create an inversion over `grid` with default parameters
    pub fn new(grid: &'a CurieGrid) -> Self {
        Self::with_params(grid, InversionParams::default())
    }

    /// Create an inversion with custom parameters
    pub fn with_params(grid: &'a CurieGrid, params: InversionParams) -> Self {
        Self {
            grid,
            params,
            subgrid_hook: None,
        }
    }

    /// Install a subgrid post-processing hook (identity by default)
    pub fn with_subgrid_hook(mut self, hook: SubgridHook) -> Self {
        self.subgrid_hook = Some(hook);
        self
    }

    pub fn params(&self) -> &InversionParams {
        &self.params
    }

    /// Invert one subgrid: radial spectra, 2π unit normalization, band
    /// masking, and the two weighted line fits.
    pub fn invert(&self, subgrid: &Array2<f64>) -> CurieResult<InversionResult> {
        let (dx, dy) = self.grid.resolution();
        let spectra = self.params.model.calculate_spectra(
            subgrid,
            self.params.taper,
            self.params.power,
            dx * 1e-3,
            dy * 1e-3,
        )?;

        // rad/km -> cycles/km; spectra scaled by the same convention
        let two_pi = 2.0 * PI;
        let k: Vec<f64> = spectra.k.iter().map(|v| v / two_pi).collect();
        let phi: Vec<f64> = spectra.phi.iter().map(|v| v / two_pi).collect();
        let phi_n: Vec<f64> = spectra.phi_n.iter().map(|v| v / two_pi).collect();
        let sigma_phi: Vec<f64> = spectra.sigma_phi.iter().map(|v| v / two_pi).collect();
        let sigma_phi_n: Vec<f64> = spectra.sigma_phi_n.iter().map(|v| v / two_pi).collect();

        let (zt_k, zt_phi, zt_sigma) = select_band(&k, &phi, &sigma_phi, self.params.zt_range);
        if zt_k.len() < 3 {
            return Err(CurieError::InsufficientData(FitRange::Zt));
        }
        let (z0_k, z0_phi, z0_sigma) =
            select_band(&k, &phi_n, &sigma_phi_n, self.params.z0_range);
        if z0_k.len() < 3 {
            return Err(CurieError::InsufficientData(FitRange::Z0));
        }

        let zt_fit = wls_line_fit(&zt_k, &zt_phi, &zt_sigma)?;
        let z0_fit = wls_line_fit(&z0_k, &z0_phi, &z0_sigma)?;

        Ok(InversionResult {
            zt_slope: zt_fit.slope,
            z0_slope: z0_fit.slope,
            zt_intercept: zt_fit.intercept,
            z0_intercept: z0_fit.intercept,
            zt_slope_stdev: zt_fit.slope_stdev,
            z0_slope_stdev: z0_fit.slope_stdev,
        })
    }

    /// Single-centroid optimisation: extract the window, gate on missing
    /// data, run the optional hook, invert.
    ///
    /// Degrades instead of crashing: any recoverable failure yields the
    /// all-NaN sentinel so one bad window never aborts a batch.
    pub fn optimise(&self, window: f64, xc: f64, yc: f64) -> InversionResult {
        let mut subgrid = match self.grid.subgrid(window, xc, yc) {
            Ok(sub) => sub,
            Err(e) => {
                log::debug!("centroid ({}, {}): {}", xc, yc, e);
                return InversionResult::not_computable();
            }
        };

        if nan_fraction(&subgrid) >= self.params.nan_fraction {
            log::debug!(
                "centroid ({}, {}): missing-data fraction above {}",
                xc,
                yc,
                self.params.nan_fraction
            );
            return InversionResult::not_computable();
        }

        if let Some(hook) = &self.subgrid_hook {
            subgrid = hook(subgrid);
        }

        match self.invert(&subgrid) {
            Ok(result) => result,
            Err(e) if e.is_recoverable() => {
                log::debug!("centroid ({}, {}): {}", xc, yc, e);
                InversionResult::not_computable()
            }
            Err(e) => {
                log::warn!("centroid ({}, {}): {}", xc, yc, e);
                InversionResult::not_computable()
            }
        }
    }

    /// Apply [`optimise`](Self::optimise) to every centroid of the list.
    ///
    /// Output position i always corresponds to input centroid i, regardless
    /// of worker scheduling. The worker pool is bounded by
    /// `params.max_workers` (available parallelism when unset).
    pub fn optimise_routine(
        &self,
        window: f64,
        xc_list: &[f64],
        yc_list: &[f64],
    ) -> CurieResult<BatchResult> {
        if xc_list.len() != yc_list.len() {
            return Err(CurieError::Processing(format!(
                "centroid list lengths differ: x={}, y={}",
                xc_list.len(),
                yc_list.len()
            )));
        }

        log::info!(
            "inverting {} centroids at window {} m ({:?})",
            xc_list.len(),
            window,
            self.params.model
        );

        let results = self.run_batch(window, xc_list, yc_list)?;

        let batch: BatchResult = results.into_iter().collect();
        log::info!(
            "batch complete: {} of {} centroids inverted",
            batch.zt_slope.iter().filter(|v| v.is_finite()).count(),
            batch.len()
        );
        Ok(batch)
    }

    #[cfg(feature = "parallel")]
    fn run_batch(
        &self,
        window: f64,
        xc_list: &[f64],
        yc_list: &[f64],
    ) -> CurieResult<Vec<InversionResult>> {
        use rayon::prelude::*;

        // indexed parallel map keeps output order independent of scheduling
        let map_batch = || {
            xc_list
                .par_iter()
                .zip(yc_list.par_iter())
                .map(|(&xc, &yc)| self.optimise(window, xc, yc))
                .collect()
        };

        // a dedicated pool only for an explicit worker cap; repeated batch
        // calls without one share the global pool
        match self.params.max_workers {
            Some(workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| CurieError::Processing(format!("worker pool: {}", e)))?;
                Ok(pool.install(map_batch))
            }
            None => Ok(map_batch()),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_batch(
        &self,
        window: f64,
        xc_list: &[f64],
        yc_list: &[f64],
    ) -> CurieResult<Vec<InversionResult>> {
        Ok(xc_list
            .iter()
            .zip(yc_list.iter())
            .map(|(&xc, &yc)| self.optimise(window, xc, yc))
            .collect())
    }
}

/// Select the spectrum points whose wavenumber lies inside [min, max]
fn select_band(
    k: &[f64],
    phi: &[f64],
    sigma: &[f64],
    range: (f64, f64),
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let (lo, hi) = range;
    let mut k_out = Vec::new();
    let mut phi_out = Vec::new();
    let mut sigma_out = Vec::new();
    for i in 0..k.len() {
        if k[i] >= lo && k[i] <= hi {
            k_out.push(k[i]);
            phi_out.push(phi[i]);
            sigma_out.push(sigma[i]);
        }
    }
    (k_out, phi_out, sigma_out)
}

/// Curie point depth from top and centroid depths: CPD = 2*z0 - zt, with
/// the uncertainty propagated as sqrt(sigma_zt^2 + (2*sigma_z0)^2).
pub fn calculate_cpd(zt: f64, z0: f64, sigma_zt: f64, sigma_z0: f64) -> CpdResult {
    CpdResult {
        cpd: 2.0 * z0 - zt,
        cpd_stdev: (sigma_zt * sigma_zt + (2.0 * sigma_z0) * (2.0 * sigma_z0)).sqrt(),
    }
}

/// Elementwise [`calculate_cpd`] over a batch; output arrays parallel to
/// the batch's centroid order. NaN rows stay NaN.
pub fn calculate_cpd_batch(batch: &BatchResult) -> (Vec<f64>, Vec<f64>) {
    let mut cpd = Vec::with_capacity(batch.len());
    let mut cpd_stdev = Vec::with_capacity(batch.len());
    for i in 0..batch.len() {
        let r = calculate_cpd(
            batch.zt_slope[i],
            batch.z0_slope[i],
            batch.zt_slope_stdev[i],
            batch.z0_slope_stdev[i],
        );
        cpd.push(r.cpd);
        cpd_stdev.push(r.cpd_stdev);
    }
    (cpd, cpd_stdev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MagGrid;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    /// Deterministic broadband magnetic field on a 5 km grid
    fn create_test_grid(ny: usize, nx: usize) -> CurieGrid {
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let data: MagGrid = Array2::from_shape_fn((ny, nx), |(j, i)| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let noise = (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5;
            let x = i as f64;
            let y = j as f64;
            20.0 * (0.09 * x).sin() + 15.0 * (0.06 * y).cos() + 10.0 * noise
        });
        let dx = 5e3;
        CurieGrid::new(
            data,
            0.0,
            (nx - 1) as f64 * dx,
            0.0,
            (ny - 1) as f64 * dx,
        )
        .unwrap()
    }

    fn test_params() -> InversionParams {
        InversionParams {
            zt_range: (0.02, 0.06),
            z0_range: (0.004, 0.02),
            taper: Taper::Hanning,
            nan_fraction: 0.5,
            ..InversionParams::default()
        }
    }

    #[test]
    fn test_calculate_cpd_literal() {
        let r = calculate_cpd(2.0, 5.0, 0.3, 0.4);
        assert_relative_eq!(r.cpd, 8.0, epsilon = 1e-12);
        assert_relative_eq!(r.cpd_stdev, (0.3f64 * 0.3 + 0.8 * 0.8).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_calculate_cpd_batch_preserves_nans() {
        let mut batch = BatchResult::default();
        batch.push(InversionResult {
            zt_slope: 2.0,
            z0_slope: 5.0,
            zt_intercept: 0.0,
            z0_intercept: 0.0,
            zt_slope_stdev: 0.3,
            z0_slope_stdev: 0.4,
        });
        batch.push(InversionResult::not_computable());

        let (cpd, stdev) = calculate_cpd_batch(&batch);
        assert_relative_eq!(cpd[0], 8.0);
        assert!(stdev[0].is_finite());
        assert!(cpd[1].is_nan());
        assert!(stdev[1].is_nan());
    }

    #[test]
    fn test_invert_finite_on_clean_window() {
        let grid = create_test_grid(128, 128);
        let inv = CurieInversion::with_params(&grid, test_params());

        let sub = grid.subgrid(300e3, 300e3, 300e3).unwrap();
        let result = inv.invert(&sub).unwrap();
        assert!(result.zt_slope.is_finite());
        assert!(result.z0_slope.is_finite());
        assert!(result.zt_slope_stdev > 0.0);
        assert!(result.z0_slope_stdev > 0.0);
    }

    #[test]
    fn test_insufficient_points_names_range() {
        let grid = create_test_grid(128, 128);
        let mut params = test_params();
        params.zt_range = (10.0, 20.0); // far beyond Nyquist
        let inv = CurieInversion::with_params(&grid, params);

        let sub = grid.subgrid(300e3, 300e3, 300e3).unwrap();
        match inv.invert(&sub) {
            Err(CurieError::InsufficientData(range)) => assert_eq!(range, FitRange::Zt),
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_optimise_catches_insufficient_data() {
        let grid = create_test_grid(128, 128);
        let mut params = test_params();
        params.z0_range = (10.0, 20.0);
        let inv = CurieInversion::with_params(&grid, params);

        let result = inv.optimise(300e3, 300e3, 300e3);
        assert!(result.is_not_computable());
    }

    #[test]
    fn test_optimise_all_nan_window() {
        let data = Array2::from_elem((128, 128), f64::NAN);
        let grid = CurieGrid::new(data, 0.0, 635e3, 0.0, 635e3).unwrap();
        let inv = CurieInversion::with_params(&grid, test_params());

        let result = inv.optimise(300e3, 300e3, 300e3);
        assert!(result.is_not_computable());
    }

    #[test]
    fn test_optimise_out_of_bounds_degrades() {
        let grid = create_test_grid(128, 128);
        let inv = CurieInversion::with_params(&grid, test_params());

        let result = inv.optimise(300e3, 10e3, 10e3);
        assert!(result.is_not_computable());
    }

    #[test]
    fn test_nan_gate_below_threshold_still_inverts() {
        // poke a few holes well below the 0.5 threshold
        let mut data = create_test_grid(128, 128).data().clone();
        for j in (0..128).step_by(17) {
            data[[j, j]] = f64::NAN;
        }
        let grid = CurieGrid::new(data, 0.0, 635e3, 0.0, 635e3).unwrap();
        let inv = CurieInversion::with_params(&grid, test_params());
        let result = inv.optimise(300e3, 300e3, 300e3);
        assert!(result.zt_slope.is_finite());
    }

    #[test]
    fn test_subgrid_hook_is_applied() {
        let grid = create_test_grid(128, 128);
        let inv = CurieInversion::with_params(&grid, test_params());
        let plain = inv.optimise(300e3, 300e3, 300e3);

        // amplitude scaling shifts the spectrum level, not the slopes
        let scaled = CurieInversion::with_params(&grid, test_params())
            .with_subgrid_hook(Arc::new(|sub| sub * 2.0));
        let hooked = scaled.optimise(300e3, 300e3, 300e3);

        assert_relative_eq!(hooked.zt_slope, plain.zt_slope, epsilon = 1e-9);
        assert!((hooked.zt_intercept - plain.zt_intercept).abs() > 1e-6);
    }

    #[test]
    fn test_batch_matches_single_and_preserves_order() {
        let grid = create_test_grid(128, 128);
        let inv = CurieInversion::with_params(&grid, test_params());

        // second centroid is out of bounds on purpose
        let xc = vec![300e3, 10e3, 320e3];
        let yc = vec![300e3, 10e3, 300e3];
        let batch = inv.optimise_routine(300e3, &xc, &yc).unwrap();

        assert_eq!(batch.len(), 3);
        assert!(batch.get(1).unwrap().is_not_computable());
        for (i, (&x, &y)) in xc.iter().zip(yc.iter()).enumerate() {
            let single = inv.optimise(300e3, x, y);
            let from_batch = batch.get(i).unwrap();
            if single.is_not_computable() {
                assert!(from_batch.is_not_computable());
            } else {
                assert_relative_eq!(single.zt_slope, from_batch.zt_slope, epsilon = 1e-12);
                assert_relative_eq!(single.z0_slope, from_batch.z0_slope, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_batch_length_mismatch() {
        let grid = create_test_grid(64, 64);
        let inv = CurieInversion::new(&grid);
        let err = inv.optimise_routine(100e3, &[0.0, 1.0], &[0.0]).unwrap_err();
        assert!(matches!(err, CurieError::Processing(_)));
    }
}
