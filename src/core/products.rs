//! Result-column assembly for export.
//!
//! Turns batch inversion output into the named columns the tabular export
//! expects: `{window}km_{field}_{method}_{area}` for computed quantities and
//! `{window}km_corner_{i}_{axis}` for window-corner coordinates. Depths are
//! referenced to sea level via the survey flight height and reported
//! negative-down.

use crate::core::inversion::calculate_cpd_batch;
use crate::types::{BatchResult, Method};
use std::collections::BTreeMap;

/// Named result columns, ordered deterministically for export
pub type ColumnMap = BTreeMap<String, Vec<f64>>;

/// Window label in km without trailing zeros, e.g. `300km`, `312.5km`
pub fn window_label(window_m: f64) -> String {
    format!("{}km", window_m / 1e3)
}

/// Full column key: `{window}km_{field}_{method}_{area}`
pub fn column_key(window_m: f64, field: &str, method: Method, area: &str) -> String {
    format!("{}_{}_{}_{}", window_label(window_m), field, method, area)
}

/// Window-corner coordinate columns, `{window}km_corner_{0..3}_{x|y}`.
/// Corners are ordered counter-clockwise from the lower-left.
pub fn corner_columns(window_m: f64, xc_list: &[f64], yc_list: &[f64]) -> ColumnMap {
    let label = window_label(window_m);
    let half = window_m / 2.0;
    let mut columns = ColumnMap::new();

    let offsets = [(-half, -half), (-half, half), (half, half), (half, -half)];
    for (i, (ox, oy)) in offsets.iter().enumerate() {
        columns.insert(
            format!("{}_corner_{}_x", label, i),
            xc_list.iter().map(|x| x + ox).collect(),
        );
        columns.insert(
            format!("{}_corner_{}_y", label, i),
            yc_list.iter().map(|y| y + oy).collect(),
        );
    }
    columns
}

/// Depth and uncertainty columns from one batch, bare field names.
///
/// Slopes are depths in km (positive-down); output depths are negative-down
/// and shifted by `flight_height` km to reference sea level. Min/max
/// envelopes bracket the top and base surfaces by one standard deviation.
pub fn depth_products(batch: &BatchResult, flight_height: f64) -> ColumnMap {
    let (cpd, cpd_stdev) = calculate_cpd_batch(batch);

    let neg_ref = |v: &[f64]| -> Vec<f64> { v.iter().map(|z| -z - flight_height).collect() };
    let z_top = neg_ref(&batch.zt_slope);
    let z_centroid = neg_ref(&batch.z0_slope);
    let z_base = neg_ref(&cpd);

    let mut columns = ColumnMap::new();
    for (surface, depths, errors) in [
        ("top", &z_top, &batch.zt_slope_stdev),
        ("base", &z_base, &cpd_stdev),
    ] {
        columns.insert(
            format!("z_{}_min", surface),
            depths.iter().zip(errors.iter()).map(|(z, e)| z - e).collect(),
        );
        columns.insert(
            format!("z_{}_max", surface),
            depths.iter().zip(errors.iter()).map(|(z, e)| z + e).collect(),
        );
    }
    columns.insert("z_top".into(), z_top);
    columns.insert("z_centroid".into(), z_centroid);
    columns.insert("z_base".into(), z_base);
    columns.insert("error_top".into(), batch.zt_slope_stdev.clone());
    columns.insert("error_centroid".into(), batch.z0_slope_stdev.clone());
    columns.insert("error_base".into(), cpd_stdev);
    columns
}

/// Fully keyed result columns for one window/method/area combination.
///
/// Bouligand is recognized by run configurations but has no spectral-slope
/// inversion here; it is skipped with a warning and yields no columns.
pub fn method_columns(
    window_m: f64,
    method: Method,
    area: &str,
    batch: &BatchResult,
    flight_height: f64,
) -> ColumnMap {
    if method == Method::Bouligand {
        log::warn!(
            "skipping bouligand for area {}: method not supported by the spectral-slope engine",
            area
        );
        return ColumnMap::new();
    }

    depth_products(batch, flight_height)
        .into_iter()
        .map(|(field, values)| (column_key(window_m, &field, method, area), values))
        .collect()
}
