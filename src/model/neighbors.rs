use aprender::error::{AprenderError, Result};
use aprender::primitives::{Matrix, Vector};
use serde::{Deserialize, Serialize};

/// k-nearest-neighbor regression: mean target of the `k` closest training rows.
///
/// aprender only ships a kNN classifier. Distances are Euclidean, so callers
/// standardize features first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighbors {
    k: usize,
    points: Option<Matrix<f32>>,
    targets: Vec<f32>,
}

impl NearestNeighbors {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            points: None,
            targets: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Feature width of the stored points.
    pub fn width(&self) -> usize {
        self.points.as_ref().map_or(0, |points| points.shape().1)
    }

    pub fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let (rows, _) = x.shape();
        if rows != y.len() {
            return Err(AprenderError::dimension_mismatch("samples", rows, y.len()));
        }
        if rows == 0 {
            return Err("Cannot fit with zero samples".into());
        }
        self.points = Some(x.clone());
        self.targets = y.as_slice().to_vec();
        Ok(())
    }

    pub fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let (rows, _) = x.shape();
        let predictions = (0..rows)
            .map(|row| self.predict_one(x.row(row).as_slice()))
            .collect();
        Vector::from_vec(predictions)
    }

    fn predict_one(&self, sample: &[f32]) -> f32 {
        let Some(points) = &self.points else {
            return 0.0;
        };

        let mut distances: Vec<(f32, usize)> = (0..points.shape().0)
            .map(|index| (squared_distance(points.row(index).as_slice(), sample), index))
            .collect();
        // Ties resolve to the earlier training row.
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let k = self.k.min(distances.len());
        distances[..k]
            .iter()
            .map(|&(_, index)| self.targets[index])
            .sum::<f32>()
            / k as f32
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(l, r)| (l - r).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f32]) -> Matrix<f32> {
        Matrix::from_vec(values.len(), 1, values.to_vec()).expect("column matrix")
    }

    #[test]
    fn averages_the_closest_targets() {
        let x = column(&[0.0, 1.0, 2.0, 10.0, 11.0]);
        let y = Vector::from_vec(vec![1.0, 2.0, 3.0, 50.0, 60.0]);
        let mut model = NearestNeighbors::new(2);
        model.fit(&x, &y).expect("fit");

        let predicted = model.predict(&column(&[0.4, 10.6]));
        assert_eq!(predicted.as_slice(), &[1.5, 55.0]);
        assert_eq!(model.width(), 1);
    }

    #[test]
    fn k_larger_than_training_set_uses_all_rows() {
        let mut model = NearestNeighbors::new(10);
        model
            .fit(&column(&[0.0, 4.0]), &Vector::from_vec(vec![2.0, 4.0]))
            .expect("fit");
        assert_eq!(model.predict(&column(&[100.0])).as_slice(), &[3.0]);
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let mut model = NearestNeighbors::new(1);
        assert!(model
            .fit(&column(&[0.0, 1.0]), &Vector::from_vec(vec![1.0]))
            .is_err());
        assert!(model.is_empty());
    }
}
