//! Core Curie depth processing modules

pub mod grid;
pub mod taper;
pub mod spectrum;
pub mod fit;
pub mod inversion;
pub mod products;

// Re-export main types
pub use grid::{nan_fraction, CurieGrid};
pub use taper::{hanning, Taper};
pub use spectrum::{mean_infill, radial_spectrum, RadialSpectrum, Spectra, SpectrumModel};
pub use fit::{wls_line_fit, LineFit};
pub use inversion::{
    calculate_cpd, calculate_cpd_batch, CurieInversion, InversionParams, SubgridHook,
};
pub use products::{
    column_key, corner_columns, depth_products, method_columns, window_label, ColumnMap,
};
