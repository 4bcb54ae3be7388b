// cardiac_ddft - multi-cell split-timestep integrator for cardiac tissue

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Host-side reference implementations of the fixed device kernels, used
//! only by tests to check the OpenCL diffusion stencil against a known-good
//! CPU computation. Never called from the integrator itself.

#[allow(dead_code)]
#[inline(always)]
pub fn ceil_div(x: usize, y: usize) -> usize {
    assert!(x > 0);
    1 + (x - 1) / y
}

/// Zero-flux five-point Laplacian at cell `(ix, iy)` of an `nx`-by-`ny`
/// grid stored row-major. Missing neighbors (at a grid edge) are replaced
/// by the cell's own value, matching `diffusion`'s device-side stencil.
#[inline]
pub fn neumann_laplacian_2d(
    v: &[f64],
    ix: usize,
    iy: usize,
    nx: usize,
    ny: usize,
    gx: f64,
    gy: f64,
) -> f64 {
    let c = iy * nx + ix;
    let center = v[c];
    let xm = if ix > 0 { v[c - 1] } else { center };
    let xp = if ix < nx - 1 { v[c + 1] } else { center };
    let ym = if iy > 0 { v[c - nx] } else { center };
    let yp = if iy < ny - 1 { v[c + nx] } else { center };
    gx * (2.0 * center - xm - xp) + gy * (2.0 * center - ym - yp)
}

/// Computes the Neumann Laplacian for every cell of the grid, matching the
/// full-grid output of the `diffusion` device kernel.
pub fn neumann_laplacian_grid(v: &[f64], nx: usize, ny: usize, gx: f64, gy: f64) -> Vec<f64> {
    let mut out = vec![0.0; nx * ny];
    for iy in 0..ny {
        for ix in 0..nx {
            out[iy * nx + ix] = neumann_laplacian_2d(v, ix, iy, nx, ny, gx, gy);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_cell_matches_five_point_stencil() {
        // 3x3 grid, values = cell index; gx = gy = 1.
        let v: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let lap = neumann_laplacian_2d(&v, 1, 1, 3, 3, 1.0, 1.0);
        // center = 4, neighbors 3,5,1,7
        assert_eq!(lap, (2.0 * 4.0 - 3.0 - 5.0) + (2.0 * 4.0 - 1.0 - 7.0));
    }

    #[test]
    fn corner_cell_reflects_missing_neighbors() {
        let v: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let lap = neumann_laplacian_2d(&v, 0, 0, 3, 3, 1.0, 1.0);
        // center = 0, missing x- and y- neighbors replaced by center (0)
        assert_eq!(lap, (2.0 * 0.0 - 0.0 - 1.0) + (2.0 * 0.0 - 0.0 - 3.0));
    }

    #[test]
    fn uniform_field_has_zero_laplacian_everywhere() {
        let v = vec![5.0; 16];
        let grid = neumann_laplacian_grid(&v, 4, 4, 1.0, 1.0);
        assert!(grid.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn one_d_row_matches_grid_path() {
        let v: Vec<f64> = vec![1.0, 2.0, 4.0, 8.0, 16.0];
        let lap = neumann_laplacian_2d(&v, 2, 0, 5, 1, 1.0, 0.0);
        assert_eq!(lap, 2.0 * 4.0 - 2.0 - 8.0);
    }

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(ceil_div(1, 4), 1);
        assert_eq!(ceil_div(4, 4), 1);
        assert_eq!(ceil_div(5, 4), 2);
    }
}
