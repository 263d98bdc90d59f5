use ndarray::Array2;

use crate::error::{AppError, AppResult};

/// Mixing weight α of the collaborative signal, validated to lie in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeight(f64);

impl BlendWeight {
    pub fn new(alpha: f64) -> AppResult<Self> {
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(AppError::Configuration(format!(
                "Blend weight must lie in [0, 1], got {}",
                alpha
            )));
        }
        Ok(Self(alpha))
    }

    pub fn alpha(self) -> f64 {
        self.0
    }
}

impl Default for BlendWeight {
    fn default() -> Self {
        Self(0.5)
    }
}

/// Combines collaborative and content similarity
///
/// `blended[i][j] = α · collaborative[i][j] + (1 − α) · content[i][j]`. Both inputs
/// must be square, of the same size, and indexed by the same course ordering.
pub fn blend(
    collaborative: &Array2<f64>,
    content: &Array2<f64>,
    weight: BlendWeight,
) -> AppResult<Array2<f64>> {
    if collaborative.dim() != content.dim() || collaborative.nrows() != collaborative.ncols() {
        return Err(AppError::Internal(format!(
            "Cannot blend similarity matrices of shapes {:?} and {:?}",
            collaborative.dim(),
            content.dim()
        )));
    }

    let alpha = weight.alpha();
    Ok(collaborative * alpha + content * (1.0 - alpha))
}
