//! Column standardization learned on training rows only.

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Per-column centring and scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl Standardizer {
    /// Learn column means and population standard deviations.
    ///
    /// Constant columns keep a scale of 1 so they map to zero.
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n_cols = x.ncols();
        if x.nrows() == 0 {
            return Self {
                means: Array1::zeros(n_cols),
                scales: Array1::ones(n_cols),
            };
        }

        let means = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_cols));
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > 1e-12 { s } else { 1.0 });

        Self { means, scales }
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.means) / &self.scales
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn scales(&self) -> &Array1<f64> {
        &self.scales
    }
}
