//! Squared-loss gradient boosting over aprender regression trees.

use aprender::error::{AprenderError, Result};
use aprender::primitives::{Matrix, Vector};
use aprender::tree::DecisionTreeRegressor;
use serde::{Deserialize, Serialize};

/// Additive ensemble of shallow trees, each fit to the current residuals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    rounds: usize,
    learning_rate: f32,
    max_depth: usize,
    min_samples_leaf: usize,
    init: f32,
    trees: Vec<DecisionTreeRegressor>,
}

impl GradientBoosting {
    pub fn new(rounds: usize, learning_rate: f32, max_depth: usize, min_samples_leaf: usize) -> Self {
        Self {
            rounds,
            learning_rate,
            max_depth,
            min_samples_leaf,
            init: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    pub fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let (rows, _) = x.shape();
        if rows != y.len() {
            return Err(AprenderError::dimension_mismatch("samples", rows, y.len()));
        }
        if rows == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        self.init = y.mean();
        self.trees.clear();

        let mut predictions = vec![self.init; rows];
        for _ in 0..self.rounds {
            let residuals: Vec<f32> = y
                .as_slice()
                .iter()
                .zip(&predictions)
                .map(|(target, current)| target - current)
                .collect();

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.max_depth)
                .with_min_samples_leaf(self.min_samples_leaf);
            tree.fit(x, &Vector::from_vec(residuals))?;
            for (prediction, step) in predictions.iter_mut().zip(tree.predict(x).as_slice()) {
                *prediction += self.learning_rate * step;
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let mut predictions = vec![self.init; x.shape().0];
        for tree in &self.trees {
            for (prediction, step) in predictions.iter_mut().zip(tree.predict(x).as_slice()) {
                *prediction += self.learning_rate * step;
            }
        }
        Vector::from_vec(predictions)
    }
}
