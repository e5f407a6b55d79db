//! curie-depth: spectral Curie point depth estimation from aeromagnetic grids
//!
//! Estimates the depth to the bottom of crustal magnetic sources (Curie point
//! depth) by sliding square windows over an aeromagnetic raster, computing
//! the radial power spectrum of each window, and fitting weighted log-linear
//! regressions over configured wavenumber bands for the top (`zt`) and
//! centroid (`z0`) source depths. The bottom depth follows from the closed
//! form `CPD = 2*z0 - zt`.
//!
//! Raster file I/O and tabular export live outside this crate; it consumes a
//! 2D array with its spatial extent and produces named result columns.

pub mod types;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AreaConfig, BatchResult, CpdResult, CurieError, CurieResult, Extent, FitRange,
    InversionResult, MagGrid, Method,
};

pub use crate::core::{
    calculate_cpd, calculate_cpd_batch, CurieGrid, CurieInversion, InversionParams,
    RadialSpectrum, SpectrumModel, Taper,
};
