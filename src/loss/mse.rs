use crate::math::matrix::Matrix;

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE over every element: mean((predicted - expected)²)
    pub fn loss(predicted: &Matrix, expected: &Matrix) -> f64 {
        let n = predicted.data.len().max(1) as f64;
        predicted.data.iter().zip(expected.data.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n
    }

    /// Gradient of `loss` w.r.t. each predicted element: 2(predicted - expected) / n
    pub fn derivative(predicted: &Matrix, expected: &Matrix) -> Matrix {
        let scale = 2.0 / predicted.data.len().max(1) as f64;
        let data = predicted.data.iter().zip(expected.data.iter())
            .map(|(a, b)| scale * (a - b))
            .collect();
        Matrix::from_vec(predicted.rows, predicted.cols, data)
    }
}
