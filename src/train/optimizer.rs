use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::core::{Error, Result};
use crate::layers::StateDict;

/// Adam over named parameter arrays.
///
/// First/second moment estimates are kept per parameter name and
/// created lazily on the first step, so the optimizer can be built
/// before the model's state dict is known.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step_count: usize,
    first_moment: BTreeMap<String, ArrayD<f64>>,
    second_moment: BTreeMap<String, ArrayD<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step_count: 0,
            first_moment: BTreeMap::new(),
            second_moment: BTreeMap::new(),
        }
    }

    /// Override the moment decay rates
    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Apply one update in place. Every gradient must correspond to a
    /// parameter of the same shape.
    pub fn step(&mut self, params: &mut StateDict, grads: &StateDict) -> Result<()> {
        self.step_count += 1;
        let t = self.step_count as i32;
        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2 = 1.0 - self.beta2.powi(t);

        for (name, grad) in grads {
            let param = params
                .get_mut(name)
                .ok_or_else(|| Error::UnknownParameter(name.clone()))?;
            if param.shape() != grad.shape() {
                return Err(Error::ShapeMismatch {
                    expected: format!("{:?}", param.shape()),
                    got: format!("{:?}", grad.shape()),
                });
            }

            let m = self
                .first_moment
                .entry(name.clone())
                .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
            let v = self
                .second_moment
                .entry(name.clone())
                .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));

            *m = &*m * self.beta1 + grad * (1.0 - self.beta1);
            *v = &*v * self.beta2 + &(grad * grad) * (1.0 - self.beta2);

            let m_hat = &*m / bias1;
            let v_hat = &*v / bias2;
            let update = m_hat / (v_hat.mapv(f64::sqrt) + self.epsilon);
            *param = &*param - &(update * self.learning_rate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn singleton(value: f64) -> StateDict {
        let mut state = StateDict::new();
        state.insert(
            "w".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[1]), vec![value]).unwrap(),
        );
        state
    }

    #[test]
    fn test_adam_minimizes_quadratic() {
        // d/dw (w - 3)^2 = 2 (w - 3); Adam should walk w toward 3
        let mut params = singleton(0.0);
        let mut adam = Adam::new(0.1);
        for _ in 0..500 {
            let w = params["w"][[0]];
            let grads = singleton(2.0 * (w - 3.0));
            adam.step(&mut params, &grads).unwrap();
        }
        let w = params["w"][[0]];
        assert!((w - 3.0).abs() < 0.05, "w = {}", w);
    }

    #[test]
    fn test_adam_rejects_unknown_parameter() {
        let mut params = singleton(0.0);
        let mut grads = StateDict::new();
        grads.insert(
            "other".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[1]), vec![1.0]).unwrap(),
        );
        let mut adam = Adam::new(0.1);
        assert!(adam.step(&mut params, &grads).is_err());
    }

    #[test]
    fn test_adam_rejects_shape_mismatch() {
        let mut params = singleton(0.0);
        let mut grads = StateDict::new();
        grads.insert("w".to_string(), ArrayD::zeros(IxDyn(&[2])));
        let mut adam = Adam::new(0.1);
        assert!(adam.step(&mut params, &grads).is_err());
    }
}
