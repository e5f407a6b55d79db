use crate::core::taper::Taper;
use crate::types::{CurieError, CurieResult};
use ndarray::Array2;
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Azimuthally averaged power spectrum of a subgrid.
///
/// One entry per radial wavenumber bin, `k` ascending in rad/km. `phi` is
/// the mean log-power in the bin and `sigma_phi` its standard error across
/// the bin's 2D frequency samples.
#[derive(Debug, Clone)]
pub struct RadialSpectrum {
    pub k: Vec<f64>,
    pub phi: Vec<f64>,
    pub sigma_phi: Vec<f64>,
}

/// Raw and centroid-normalized spectra used by the depth fits
#[derive(Debug, Clone)]
pub struct Spectra {
    pub k: Vec<f64>,
    pub phi: Vec<f64>,
    pub phi_n: Vec<f64>,
    pub sigma_phi: Vec<f64>,
    pub sigma_phi_n: Vec<f64>,
}

/// Spectrum-calculation strategy selecting the source-depth model.
///
/// Bansal is a spectral pre-processing variant of Tanaka (a fractal
/// correction added to both spectra before fitting); the masking and
/// fitting machinery downstream is shared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpectrumModel {
    /// Tanaka et al. (1999) centroid method
    Tanaka,
    /// Bansal et al. (2011) fractal variant with exponent `beta`
    Bansal { beta: f64 },
}

impl SpectrumModel {
    /// Compute the raw spectrum `phi` and the normalized spectrum
    /// `phi_n = ln(exp(phi)/k)` with their standard errors, applying the
    /// model's spectral correction.
    pub fn calculate_spectra(
        &self,
        subgrid: &Array2<f64>,
        taper: Taper,
        power: f64,
        dx_km: f64,
        dy_km: f64,
    ) -> CurieResult<Spectra> {
        let rs = radial_spectrum(subgrid, taper, power, dx_km, dy_km)?;

        let ln_k: Vec<f64> = rs.k.iter().map(|k| k.ln()).collect();
        let mut phi = rs.phi;
        let mut phi_n: Vec<f64> = phi.iter().zip(&ln_k).map(|(p, l)| p - l).collect();
        let sigma_phi_n: Vec<f64> = rs.sigma_phi.iter().zip(&ln_k).map(|(s, l)| s - l).collect();

        if let SpectrumModel::Bansal { beta } = self {
            // fractal-source correction; vanishes at beta = 1
            for ((p, pn), l) in phi.iter_mut().zip(phi_n.iter_mut()).zip(&ln_k) {
                let corr = l * (beta - 1.0) / 2.0;
                *p += corr;
                *pn += corr;
            }
        }

        Ok(Spectra {
            k: rs.k,
            phi,
            phi_n,
            sigma_phi: rs.sigma_phi,
            sigma_phi_n,
        })
    }
}

/// Replace NaN cells with the mean of the finite cells.
///
/// This is the missing-value policy applied before the FFT; windows with too
/// many missing cells are rejected upstream by the `nan_fraction` gate. A
/// subgrid with no finite cell at all is a degenerate spectrum.
pub fn mean_infill(subgrid: &mut Array2<f64>) -> CurieResult<()> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in subgrid.iter() {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        return Err(CurieError::DegenerateSpectrum(
            "subgrid contains no finite values".into(),
        ));
    }
    if count < subgrid.len() {
        let mean = sum / count as f64;
        for v in subgrid.iter_mut() {
            if !v.is_finite() {
                *v = mean;
            }
        }
    }
    Ok(())
}

/// Compute the azimuthally averaged 1D power spectrum of a 2D subgrid.
///
/// The subgrid is mean-infilled, tapered, Fourier transformed; the squared
/// magnitudes (raised to `power`) are binned by radial wavenumber. Within
/// each bin the mean log-power and its standard error are taken across the
/// bin's constituent 2D frequency samples.
///
/// Fails with `DegenerateSpectrum` when a bin's power is non-positive, so
/// callers can substitute "not computable" instead of carrying silent NaN.
pub fn radial_spectrum(
    subgrid: &Array2<f64>,
    taper: Taper,
    power: f64,
    dx_km: f64,
    dy_km: f64,
) -> CurieResult<RadialSpectrum> {
    let (ny, nx) = subgrid.dim();
    if nx < 4 || ny < 4 {
        return Err(CurieError::DegenerateSpectrum(format!(
            "subgrid {}x{} is too small for spectral analysis",
            ny, nx
        )));
    }

    let mut data = subgrid.clone();
    mean_infill(&mut data)?;
    taper.apply(&mut data);

    let ft = fft2(&data);

    // radial wavenumber per sample, in rad/km, from the wrapped DFT
    // frequency offsets along each axis
    let dkx = 2.0 * std::f64::consts::PI / ((nx - 1) as f64 * dx_km);
    let dky = 2.0 * std::f64::consts::PI / ((ny - 1) as f64 * dy_km);
    let dk = dkx.max(dky);
    let nw = nx.min(ny);

    let nbins = (nw / 2).saturating_sub(1);
    if nbins < 1 {
        return Err(CurieError::DegenerateSpectrum(
            "window too small to form radial bins".into(),
        ));
    }

    let mut bin_logs: Vec<Vec<f64>> = vec![Vec::new(); nbins];
    let mut bin_pows: Vec<Vec<f64>> = vec![Vec::new(); nbins];
    let mut bin_ks: Vec<Vec<f64>> = vec![Vec::new(); nbins];

    for j in 0..ny {
        let fy = wrapped_offset(j, ny) * dky;
        for i in 0..nx {
            let fx = wrapped_offset(i, nx) * dkx;
            let kk = fx.hypot(fy);
            // bin b covers [dk*(b+1), dk*(b+2)); DC stays below the first bin
            if kk < dk {
                continue;
            }
            let b = (kk / dk - 1.0).floor() as usize;
            if b >= nbins {
                continue;
            }
            let p = ft[[j, i]].norm_sqr().powf(power);
            if !(p > 0.0) || !p.is_finite() {
                return Err(CurieError::DegenerateSpectrum(format!(
                    "log of non-positive power at k = {:.4} rad/km",
                    kk
                )));
            }
            bin_pows[b].push(p);
            bin_logs[b].push(p.ln());
            bin_ks[b].push(kk);
        }
    }

    let mut k = Vec::with_capacity(nbins);
    let mut phi = Vec::with_capacity(nbins);
    let mut sigma_phi = Vec::with_capacity(nbins);
    for b in 0..nbins {
        let n = bin_pows[b].len();
        if n == 0 {
            continue;
        }
        let nf = n as f64;
        let mean_pow = bin_pows[b].iter().sum::<f64>() / nf;
        let mean_log = bin_logs[b].iter().sum::<f64>() / nf;
        let var_log = bin_logs[b]
            .iter()
            .map(|l| (l - mean_log).powi(2))
            .sum::<f64>()
            / nf;

        k.push(bin_ks[b].iter().sum::<f64>() / nf);
        phi.push(mean_pow.ln());
        sigma_phi.push(var_log.sqrt() / nf.sqrt());
    }

    if k.is_empty() {
        return Err(CurieError::DegenerateSpectrum(
            "no populated radial bins".into(),
        ));
    }

    Ok(RadialSpectrum { k, phi, sigma_phi })
}

/// Signed DFT frequency offset for index `i` of an `n`-point transform
fn wrapped_offset(i: usize, n: usize) -> f64 {
    if i <= n / 2 {
        i as f64
    } else {
        i as f64 - n as f64
    }
}

/// 2D DFT by separable 1D transforms (rows, then columns)
fn fft2(data: &Array2<f64>) -> Array2<Complex64> {
    let (ny, nx) = data.dim();
    let mut planner = FftPlanner::<f64>::new();
    let fft_rows = planner.plan_fft_forward(nx);
    let fft_cols = planner.plan_fft_forward(ny);

    let mut ft = Array2::from_shape_fn((ny, nx), |(j, i)| Complex64::new(data[[j, i]], 0.0));

    let mut row_buf = vec![Complex64::new(0.0, 0.0); nx];
    for j in 0..ny {
        for i in 0..nx {
            row_buf[i] = ft[[j, i]];
        }
        fft_rows.process(&mut row_buf);
        for i in 0..nx {
            ft[[j, i]] = row_buf[i];
        }
    }

    let mut col_buf = vec![Complex64::new(0.0, 0.0); ny];
    for i in 0..nx {
        for j in 0..ny {
            col_buf[j] = ft[[j, i]];
        }
        fft_cols.process(&mut col_buf);
        for j in 0..ny {
            ft[[j, i]] = col_buf[j];
        }
    }

    ft
}
