use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Magnetic field grid values in nT; NaN marks no-data cells
pub type MagGrid = Array2<f64>;

/// Spatial extent of a grid: (x0, x1, y0, y1) in metres
pub type Extent = (f64, f64, f64, f64);

/// Depth estimation methods supported by run configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Tanaka,
    Bansal,
    Bouligand,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Tanaka => write!(f, "tanaka"),
            Method::Bansal => write!(f, "bansal"),
            Method::Bouligand => write!(f, "bouligand"),
        }
    }
}

/// Run configuration for one study area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaConfig {
    /// Source raster file name (resolved by the caller)
    pub filename: String,
    /// Survey flight height in km, added to depths to reference sea level
    pub flight_height: f64,
    /// Methods to run for this area
    pub methods: Vec<Method>,
    /// Wavenumber bounds for the top-depth fit (cycles/km)
    pub zt_range: (f64, f64),
    /// Wavenumber bounds for the centroid-depth fit (cycles/km)
    pub z0_range: (f64, f64),
    /// Wavenumber bounds for the Bouligand fit (recognized, not run here)
    pub bouligand_k_range: (f64, f64),
    /// Fractal exponent for the Bansal model
    pub bansal_beta: f64,
    /// Window side lengths in metres
    pub window_sizes: Vec<f64>,
}

impl AreaConfig {
    /// Check the record for values the inversion cannot work with
    pub fn validate(&self) -> CurieResult<()> {
        if self.filename.is_empty() {
            return Err(CurieError::Config("filename must not be empty".into()));
        }
        if self.methods.is_empty() {
            return Err(CurieError::Config("at least one method is required".into()));
        }
        for (name, (lo, hi)) in [("zt_range", self.zt_range), ("z0_range", self.z0_range)] {
            if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
                return Err(CurieError::Config(format!(
                    "{} must be a finite interval with min < max, got ({}, {})",
                    name, lo, hi
                )));
            }
        }
        if self.window_sizes.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(CurieError::Config(
                "window sizes must be positive and finite".into(),
            ));
        }
        if !self.bansal_beta.is_finite() {
            return Err(CurieError::Config("bansal_beta must be finite".into()));
        }
        Ok(())
    }
}

/// Per-centroid spectral inversion output.
///
/// Slopes and intercepts come from the two weighted line fits; a centroid
/// whose window could not be inverted carries NaN in every field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InversionResult {
    pub zt_slope: f64,
    pub z0_slope: f64,
    pub zt_intercept: f64,
    pub z0_intercept: f64,
    pub zt_slope_stdev: f64,
    pub z0_slope_stdev: f64,
}

impl InversionResult {
    /// Sentinel result for windows that could not be inverted
    pub fn not_computable() -> Self {
        Self {
            zt_slope: f64::NAN,
            z0_slope: f64::NAN,
            zt_intercept: f64::NAN,
            z0_intercept: f64::NAN,
            zt_slope_stdev: f64::NAN,
            z0_slope_stdev: f64::NAN,
        }
    }

    /// True if every field is NaN
    pub fn is_not_computable(&self) -> bool {
        self.zt_slope.is_nan()
            && self.z0_slope.is_nan()
            && self.zt_intercept.is_nan()
            && self.z0_intercept.is_nan()
            && self.zt_slope_stdev.is_nan()
            && self.z0_slope_stdev.is_nan()
    }
}

/// Curie point depth with its propagated standard deviation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpdResult {
    pub cpd: f64,
    pub cpd_stdev: f64,
}

/// Batch inversion output: six arrays parallel to the input centroid list
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub zt_slope: Vec<f64>,
    pub z0_slope: Vec<f64>,
    pub zt_intercept: Vec<f64>,
    pub z0_intercept: Vec<f64>,
    pub zt_slope_stdev: Vec<f64>,
    pub z0_slope_stdev: Vec<f64>,
}

impl BatchResult {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            zt_slope: Vec::with_capacity(n),
            z0_slope: Vec::with_capacity(n),
            zt_intercept: Vec::with_capacity(n),
            z0_intercept: Vec::with_capacity(n),
            zt_slope_stdev: Vec::with_capacity(n),
            z0_slope_stdev: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.zt_slope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zt_slope.is_empty()
    }

    pub fn push(&mut self, r: InversionResult) {
        self.zt_slope.push(r.zt_slope);
        self.z0_slope.push(r.z0_slope);
        self.zt_intercept.push(r.zt_intercept);
        self.z0_intercept.push(r.z0_intercept);
        self.zt_slope_stdev.push(r.zt_slope_stdev);
        self.z0_slope_stdev.push(r.z0_slope_stdev);
    }

    /// Row `i` as a single result, or `None` past the end
    pub fn get(&self, i: usize) -> Option<InversionResult> {
        if i >= self.len() {
            return None;
        }
        Some(InversionResult {
            zt_slope: self.zt_slope[i],
            z0_slope: self.z0_slope[i],
            zt_intercept: self.zt_intercept[i],
            z0_intercept: self.z0_intercept[i],
            zt_slope_stdev: self.zt_slope_stdev[i],
            z0_slope_stdev: self.z0_slope_stdev[i],
        })
    }
}

impl FromIterator<InversionResult> for BatchResult {
    fn from_iter<I: IntoIterator<Item = InversionResult>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut batch = BatchResult::with_capacity(iter.size_hint().0);
        for r in iter {
            batch.push(r);
        }
        batch
    }
}

/// Names the fit range that held too few spectral points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitRange {
    Zt,
    Z0,
}

impl std::fmt::Display for FitRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitRange::Zt => write!(f, "zt_range"),
            FitRange::Z0 => write!(f, "z0_range"),
        }
    }
}

/// Error types for Curie depth processing
#[derive(Debug, thiserror::Error)]
pub enum CurieError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("window of {window} m at ({xc}, {yc}) exceeds the grid extent")]
    OutOfBounds { window: f64, xc: f64, yc: f64 },

    #[error("not enough points inside {0}, increase the range")]
    InsufficientData(FitRange),

    #[error("degenerate spectrum: {0}")]
    DegenerateSpectrum(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CurieError {
    /// Per-centroid failures that the optimisation boundary converts to NaN.
    /// Configuration and I/O errors stay fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CurieError::OutOfBounds { .. }
                | CurieError::InsufficientData(_)
                | CurieError::DegenerateSpectrum(_)
        )
    }
}

/// Result type for Curie depth operations
pub type CurieResult<T> = Result<T, CurieError>;
