use super::boosting::GradientBoosting;
use super::linear::LinearModel;
use super::neighbors::NearestNeighbors;
use aprender::error::{AprenderError, Result as FitResult};
use aprender::metrics::r_squared;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::Estimator;
use aprender::tree::{DecisionTreeRegressor, RandomForestRegressor};
use serde::{Deserialize, Serialize};

/// Candidate regressor families considered during model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorFamily {
    RandomForest,
    GradientBoosting,
    LinearRegression,
    RidgeRegression,
    RegressionTree,
    NearestNeighbors,
}

impl EstimatorFamily {
    pub const ALL: [EstimatorFamily; 6] = [
        EstimatorFamily::RandomForest,
        EstimatorFamily::GradientBoosting,
        EstimatorFamily::LinearRegression,
        EstimatorFamily::RidgeRegression,
        EstimatorFamily::RegressionTree,
        EstimatorFamily::NearestNeighbors,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            EstimatorFamily::RandomForest => "random_forest",
            EstimatorFamily::GradientBoosting => "gradient_boosting",
            EstimatorFamily::LinearRegression => "linear_regression",
            EstimatorFamily::RidgeRegression => "ridge_regression",
            EstimatorFamily::RegressionTree => "regression_tree",
            EstimatorFamily::NearestNeighbors => "nearest_neighbors",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EstimatorFamily::RandomForest => "Random Forest",
            EstimatorFamily::GradientBoosting => "Gradient Boosting",
            EstimatorFamily::LinearRegression => "Linear Regression",
            EstimatorFamily::RidgeRegression => "Ridge Regression",
            EstimatorFamily::RegressionTree => "Regression Tree",
            EstimatorFamily::NearestNeighbors => "k-Nearest Neighbors",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|family| family.key() == normalized)
    }

    /// Distance-based families need standardized features.
    pub fn requires_scaling(&self) -> bool {
        matches!(self, EstimatorFamily::NearestNeighbors)
    }

    /// Unfitted regressor for this family; `seed` drives forest bootstraps.
    pub fn candidate(&self, settings: &EstimatorSettings, seed: u64) -> Regressor {
        match self {
            EstimatorFamily::RandomForest => Regressor::Forest(
                RandomForestRegressor::new(settings.forest_trees.max(1))
                    .with_max_depth(settings.forest_max_depth)
                    .with_random_state(seed),
            ),
            EstimatorFamily::GradientBoosting => Regressor::Boosting(GradientBoosting::new(
                settings.boosting_rounds,
                settings.learning_rate as f32,
                settings.boosting_depth,
                settings.min_samples_leaf,
            )),
            EstimatorFamily::LinearRegression => Regressor::Linear(LinearModel::ordinary()),
            EstimatorFamily::RidgeRegression => {
                Regressor::Ridge(LinearModel::ridge(settings.ridge_alpha as f32))
            }
            EstimatorFamily::RegressionTree => Regressor::Tree(
                DecisionTreeRegressor::new()
                    .with_max_depth(settings.tree_max_depth)
                    .with_min_samples_leaf(settings.min_samples_leaf),
            ),
            EstimatorFamily::NearestNeighbors => {
                Regressor::Neighbors(NearestNeighbors::new(settings.neighbors))
            }
        }
    }
}

/// Hyperparameters shared by the candidate constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSettings {
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub ridge_alpha: f64,
    pub tree_max_depth: usize,
    pub min_samples_leaf: usize,
    pub boosting_rounds: usize,
    pub learning_rate: f64,
    pub boosting_depth: usize,
    pub neighbors: usize,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            forest_trees: 30,
            forest_max_depth: 8,
            ridge_alpha: 1.0,
            tree_max_depth: 8,
            min_samples_leaf: 2,
            boosting_rounds: 100,
            learning_rate: 0.1,
            boosting_depth: 3,
            neighbors: 5,
        }
    }
}

/// Packs encoded rows into the `f32` matrix the regressors train on.
pub fn to_matrix(rows: &[Vec<f64>]) -> FitResult<Matrix<f32>> {
    let width = rows.first().map_or(0, Vec::len);
    let mut data = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(AprenderError::dimension_mismatch("features", width, row.len()));
        }
        data.extend(row.iter().map(|&value| value as f32));
    }
    Ok(Matrix::from_vec(rows.len(), width, data)?)
}

pub fn to_vector(values: &[f64]) -> Vector<f32> {
    Vector::from_vec(values.iter().map(|&value| value as f32).collect())
}

/// A fitted (or fittable) regressor of one family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Regressor {
    Forest(RandomForestRegressor),
    Boosting(GradientBoosting),
    Linear(LinearModel),
    Ridge(LinearModel),
    Tree(DecisionTreeRegressor),
    Neighbors(NearestNeighbors),
}

impl Regressor {
    pub fn family(&self) -> EstimatorFamily {
        match self {
            Regressor::Forest(_) => EstimatorFamily::RandomForest,
            Regressor::Boosting(_) => EstimatorFamily::GradientBoosting,
            Regressor::Linear(_) => EstimatorFamily::LinearRegression,
            Regressor::Ridge(_) => EstimatorFamily::RidgeRegression,
            Regressor::Tree(_) => EstimatorFamily::RegressionTree,
            Regressor::Neighbors(_) => EstimatorFamily::NearestNeighbors,
        }
    }

    /// Confirms the regressor is fitted for rows of `width` features.
    ///
    /// Tree predictors index features unchecked, so every split must point
    /// inside the row.
    pub fn check_fitted(&self, width: usize) -> Result<(), String> {
        match self {
            Regressor::Linear(model) | Regressor::Ridge(model) => {
                expect_width("coefficients", model.coefficients().len(), width)
            }
            Regressor::Neighbors(model) => {
                if model.is_empty() {
                    return Err("nearest neighbors has no stored points".to_string());
                }
                expect_width("stored points", model.width(), width)
            }
            Regressor::Tree(model) => match fitted_trees(model, width)? {
                1 => Ok(()),
                _ => Err("regression tree is not fitted".to_string()),
            },
            Regressor::Forest(model) => match fitted_trees(model, width)? {
                0 => Err("random forest has no fitted trees".to_string()),
                _ => Ok(()),
            },
            Regressor::Boosting(model) => {
                let fitted = fitted_trees(model, width)?;
                if fitted == model.rounds() {
                    Ok(())
                } else {
                    Err(format!(
                        "gradient boosting has {fitted} fitted trees, expected {}",
                        model.rounds()
                    ))
                }
            }
        }
    }
}

fn expect_width(what: &str, found: usize, width: usize) -> Result<(), String> {
    if found == width {
        Ok(())
    } else {
        Err(format!("{what} cover {found} features, encoder has {width}"))
    }
}

/// aprender keeps fitted trees private, so walk their serialized form:
/// counts fitted roots and rejects splits on features outside `width`.
fn fitted_trees(model: &impl Serialize, width: usize) -> Result<usize, String> {
    fn walk(value: &serde_json::Value, width: usize, roots: &mut usize) -> Result<(), String> {
        match value {
            serde_json::Value::Object(fields) => {
                if let Some(feature) = fields.get("feature_idx") {
                    match feature.as_u64() {
                        Some(index) if (index as usize) < width => {}
                        _ => return Err(format!("tree splits on feature {feature}, width is {width}")),
                    }
                }
                match fields.get("tree") {
                    Some(serde_json::Value::Null) => return Err("tree is not fitted".to_string()),
                    Some(_) => *roots += 1,
                    None => {}
                }
                fields
                    .values()
                    .try_for_each(|child| walk(child, width, roots))
            }
            serde_json::Value::Array(items) => {
                items.iter().try_for_each(|child| walk(child, width, roots))
            }
            _ => Ok(()),
        }
    }

    let value = serde_json::to_value(model).map_err(|err| err.to_string())?;
    let mut roots = 0;
    walk(&value, width, &mut roots)?;
    Ok(roots)
}

impl Estimator for Regressor {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> FitResult<()> {
        match self {
            Regressor::Forest(model) => model.fit(x, y),
            Regressor::Boosting(model) => model.fit(x, y),
            Regressor::Linear(model) | Regressor::Ridge(model) => model.fit(x, y),
            Regressor::Tree(model) => model.fit(x, y),
            Regressor::Neighbors(model) => model.fit(x, y),
        }
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        match self {
            Regressor::Forest(model) => model.predict(x),
            Regressor::Boosting(model) => model.predict(x),
            Regressor::Linear(model) | Regressor::Ridge(model) => model.predict(x),
            Regressor::Tree(model) => model.predict(x),
            Regressor::Neighbors(model) => model.predict(x),
        }
    }

    fn score(&self, x: &Matrix<f32>, y: &Vector<f32>) -> f32 {
        r_squared(&self.predict(x), y)
    }
}
