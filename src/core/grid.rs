use crate::types::{CurieError, CurieResult, Extent, MagGrid};
use ndarray::{s, Array2};

/// Accessor over an aeromagnetic grid and its spatial extent.
///
/// The grid is loaded once per run and read-only thereafter; subgrid
/// extraction and centroid lattice generation are pure index computations.
/// Coordinates and the extent are in metres, row 0 at `y0`, column 0 at `x0`.
#[derive(Debug, Clone)]
pub struct CurieGrid {
    data: MagGrid,
    extent: Extent,
    dx: f64,
    dy: f64,
}

impl CurieGrid {
    /// Wrap a grid with its extent. The extent must be non-degenerate and
    /// consistent with the array dimensions (at least 2 nodes per axis).
    pub fn new(data: MagGrid, x0: f64, x1: f64, y0: f64, y1: f64) -> CurieResult<Self> {
        let (ny, nx) = data.dim();
        if nx < 2 || ny < 2 {
            return Err(CurieError::Processing(format!(
                "grid must be at least 2x2, got {}x{}",
                ny, nx
            )));
        }
        if !(x1 > x0 && y1 > y0) {
            return Err(CurieError::Processing(format!(
                "degenerate extent ({}, {}, {}, {})",
                x0, x1, y0, y1
            )));
        }

        let dx = (x1 - x0) / (nx - 1) as f64;
        let dy = (y1 - y0) / (ny - 1) as f64;
        Ok(Self {
            data,
            extent: (x0, x1, y0, y1),
            dx,
            dy,
        })
    }

    pub fn data(&self) -> &MagGrid {
        &self.data
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Node spacing (dx, dy) in metres
    pub fn resolution(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    /// Index of the grid node nearest to (xc, yc)
    fn nearest_node(&self, xc: f64, yc: f64) -> (isize, isize) {
        let (x0, _, y0, _) = self.extent;
        let ix = ((xc - x0) / self.dx).round() as isize;
        let iy = ((yc - y0) / self.dy).round() as isize;
        (ix, iy)
    }

    /// Half-width of a window in nodes along each axis
    fn half_width(&self, window: f64) -> (isize, isize) {
        let hx = (window / (2.0 * self.dx)).round() as isize;
        let hy = (window / (2.0 * self.dy)).round() as isize;
        (hx, hy)
    }

    /// Extract the square window of side `window` metres centred on the grid
    /// node nearest to (xc, yc).
    ///
    /// Bounds policy is strict: a window that falls even partially outside
    /// the grid extent is `CurieError::OutOfBounds`. No edge clipping.
    /// Centroids produced by [`centroid_list`](Self::centroid_list) always
    /// admit a full extraction.
    pub fn subgrid(&self, window: f64, xc: f64, yc: f64) -> CurieResult<Array2<f64>> {
        let (ny, nx) = self.data.dim();
        let (ix, iy) = self.nearest_node(xc, yc);
        let (hx, hy) = self.half_width(window);

        let (imin, imax) = (ix - hx, ix + hx);
        let (jmin, jmax) = (iy - hy, iy + hy);
        if imin < 0 || jmin < 0 || imax >= nx as isize || jmax >= ny as isize {
            return Err(CurieError::OutOfBounds { window, xc, yc });
        }

        Ok(self
            .data
            .slice(s![jmin as usize..=jmax as usize, imin as usize..=imax as usize])
            .to_owned())
    }

    /// Generate a regular centroid lattice covering `subset` of the extent.
    ///
    /// The lattice is spaced `spacing_x` x `spacing_y` apart and inset by
    /// `window / 2` from the subset boundary so that every centroid admits a
    /// full `window` extraction from the parent grid. The subset is clamped
    /// to the grid extent first. Ordering is row-major (y outer, x inner)
    /// and significant: batch results are reported positionally.
    ///
    /// Extraction works on whole nodes: the half-width rounds to
    /// `round(window/(2*dx))` nodes and the centroid snaps to its nearest
    /// node, which together can need up to one node spacing more room than
    /// the nominal `window / 2` inset. Lattice positions too close to the
    /// grid edge for that discrete footprint are trimmed.
    pub fn centroid_list(
        &self,
        window: f64,
        spacing_x: f64,
        spacing_y: f64,
        subset: Extent,
    ) -> (Vec<f64>, Vec<f64>) {
        let (x0, x1, y0, y1) = self.extent;
        let (sx0, sx1, sy0, sy1) = subset;
        let (ny, nx) = self.data.dim();
        let (hx, hy) = self.half_width(window);

        let xmin = sx0.max(x0) + window / 2.0;
        let xmax = sx1.min(x1) - window / 2.0;
        let ymin = sy0.max(y0) + window / 2.0;
        let ymax = sy1.min(y1) - window / 2.0;

        // keep only positions whose snapped node admits the full footprint,
        // mirroring the exact bounds check in subgrid()
        let mut xs = lattice_axis(xmin, xmax, spacing_x);
        xs.retain(|&xc| {
            let ix = ((xc - x0) / self.dx).round() as isize;
            ix - hx >= 0 && ix + hx < nx as isize
        });
        let mut ys = lattice_axis(ymin, ymax, spacing_y);
        ys.retain(|&yc| {
            let iy = ((yc - y0) / self.dy).round() as isize;
            iy - hy >= 0 && iy + hy < ny as isize
        });

        let mut xc_list = Vec::with_capacity(xs.len() * ys.len());
        let mut yc_list = Vec::with_capacity(xs.len() * ys.len());
        for &yc in &ys {
            for &xc in &xs {
                xc_list.push(xc);
                yc_list.push(yc);
            }
        }

        log::debug!(
            "generated {} centroids ({} x {}) for window {} m",
            xc_list.len(),
            xs.len(),
            ys.len(),
            window
        );
        (xc_list, yc_list)
    }
}

/// Fraction of NaN cells in a subgrid
pub fn nan_fraction(subgrid: &Array2<f64>) -> f64 {
    let nans = subgrid.iter().filter(|v| v.is_nan()).count();
    nans as f64 / subgrid.len() as f64
}

/// Evenly spaced positions from `min` to at most `max` (inclusive within a
/// small tolerance against accumulated rounding)
fn lattice_axis(min: f64, max: f64, spacing: f64) -> Vec<f64> {
    if max < min || spacing <= 0.0 {
        return Vec::new();
    }
    let n = ((max - min) / spacing + 1e-9).floor() as usize + 1;
    (0..n).map(|i| min + i as f64 * spacing).collect()
}
