//! Least-squares linear models fitted by aprender's normal-equation solvers.

use aprender::error::{AprenderError, Result};
use aprender::linear_model::{LinearRegression, Ridge};
use aprender::primitives::{Matrix, Vector};
use aprender::traits::Estimator;
use serde::{Deserialize, Serialize};

/// Linear model `y = intercept + coefficients · x` with optional L2 penalty.
///
/// aprender's solvers are not serializable, so only the fitted parameters
/// are kept for the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    alpha: Option<f32>,
    intercept: f32,
    coefficients: Vec<f32>,
}

impl LinearModel {
    pub fn ordinary() -> Self {
        Self {
            alpha: None,
            intercept: 0.0,
            coefficients: Vec::new(),
        }
    }

    pub fn ridge(alpha: f32) -> Self {
        Self {
            alpha: Some(alpha.max(0.0)),
            ..Self::ordinary()
        }
    }

    pub fn alpha(&self) -> Option<f32> {
        self.alpha
    }

    pub fn intercept(&self) -> f32 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    pub fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let (intercept, coefficients) = match self.alpha {
            None => {
                let mut solver = LinearRegression::new();
                solver.fit(x, y)?;
                (solver.intercept(), solver.coefficients().as_slice().to_vec())
            }
            Some(alpha) => {
                let mut solver = Ridge::new(alpha);
                solver.fit(x, y)?;
                (solver.intercept(), solver.coefficients().as_slice().to_vec())
            }
        };

        if !intercept.is_finite() || coefficients.iter().any(|beta| !beta.is_finite()) {
            return Err(AprenderError::from("normal equations produced non-finite coefficients"));
        }
        self.intercept = intercept;
        self.coefficients = coefficients;
        Ok(())
    }

    pub fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let (rows, cols) = x.shape();
        let predictions = (0..rows)
            .map(|row| {
                self.intercept
                    + self
                        .coefficients
                        .iter()
                        .take(cols)
                        .enumerate()
                        .map(|(col, beta)| beta * x.get(row, col))
                        .sum::<f32>()
            })
            .collect();
        Vector::from_vec(predictions)
    }
}
