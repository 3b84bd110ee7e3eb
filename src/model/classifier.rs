use serde::{Deserialize, Serialize};

use super::vectorizer::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    /// Inverse regularisation strength.
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the gradient norm drops below this value.
    pub tolerance: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1_000,
            tolerance: 1e-6,
        }
    }
}

/// Binary logistic regression with an L2 penalty on the weights.
///
/// Minimises `½‖w‖² + C·Σ log(1 + exp(-yᵢ(w·xᵢ + b)))` using full-batch
/// accelerated gradient descent with a fixed step of `1/L`, where `L` bounds
/// the Lipschitz constant of the gradient. There is no randomness anywhere in
/// the fit: the same rows always produce the same weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticRegression {
    pub fn fit(
        rows: &[FeatureVector],
        labels: &[bool],
        dimension: usize,
        params: &TrainingParams,
    ) -> Self {
        debug_assert_eq!(rows.len(), labels.len());

        let squared_norms: f64 = rows
            .iter()
            .map(|row| row.iter().map(|(_, v)| v * v).sum::<f64>() + 1.0)
            .sum();
        let lipschitz = 1.0 + 0.25 * params.c * squared_norms;
        let step = 1.0 / lipschitz;

        let mut current = Self::zeros(dimension);
        let mut lookahead = current.clone();
        let mut momentum_t = 1.0f64;

        for iteration in 0..params.max_iter {
            let (grad_w, grad_b) = lookahead.gradient(rows, labels, params.c);
            let grad_norm =
                (grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b).sqrt();
            if grad_norm < params.tolerance {
                current = lookahead;
                tracing::debug!(target: "model", iteration, grad_norm, "logistic regression converged");
                break;
            }

            let mut next = lookahead.clone();
            for (w, g) in next.weights.iter_mut().zip(&grad_w) {
                *w -= step * g;
            }
            next.bias -= step * grad_b;

            // Restart momentum when it points uphill.
            let uphill = grad_w
                .iter()
                .zip(next.weights.iter().zip(&current.weights))
                .map(|(g, (n, c))| g * (n - c))
                .sum::<f64>()
                + grad_b * (next.bias - current.bias);
            if uphill > 0.0 {
                momentum_t = 1.0;
            }

            let next_t = (1.0 + (1.0 + 4.0 * momentum_t * momentum_t).sqrt()) / 2.0;
            let beta = (momentum_t - 1.0) / next_t;
            lookahead = next.clone();
            for (y, (n, c)) in lookahead
                .weights
                .iter_mut()
                .zip(next.weights.iter().zip(&current.weights))
            {
                *y = n + beta * (n - c);
            }
            lookahead.bias = next.bias + beta * (next.bias - current.bias);

            current = next;
            momentum_t = next_t;
        }

        current
    }

    fn zeros(dimension: usize) -> Self {
        Self {
            weights: vec![0.0; dimension],
            bias: 0.0,
        }
    }

    fn gradient(&self, rows: &[FeatureVector], labels: &[bool], c: f64) -> (Vec<f64>, f64) {
        let mut grad_w = self.weights.clone();
        let mut grad_b = 0.0;
        for (row, &label) in rows.iter().zip(labels) {
            let target = if label { 1.0 } else { 0.0 };
            let residual = c * (sigmoid(self.decision(row)) - target);
            for &(index, value) in row {
                grad_w[index] += residual * value;
            }
            grad_b += residual;
        }
        (grad_w, grad_b)
    }

    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    pub fn decision(&self, row: &FeatureVector) -> f64 {
        row.iter()
            .filter_map(|&(index, value)| self.weights.get(index).map(|w| w * value))
            .sum::<f64>()
            + self.bias
    }

    /// Probability of the positive (phishing) class.
    pub fn probability(&self, row: &FeatureVector) -> f64 {
        sigmoid(self.decision(row))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
