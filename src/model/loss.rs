use burn::prelude::*;

/// Weights of the generator objective.
#[derive(Config, Debug)]
pub struct GeneratorLossConfig {
    #[config(default = 1e-2)]
    pub l1_weight: f64,
    #[config(default = 5e-3)]
    pub adversarial_weight: f64,
}

/// Wasserstein critic loss with gradient penalty:
/// `-(mean(real) - mean(fake)) + lambda * gp`.
pub fn critic_loss<B: Backend>(
    real_scores: Tensor<B, 2>,
    fake_scores: Tensor<B, 2>,
    gradient_penalty: Tensor<B, 1>,
    lambda: f64,
) -> Tensor<B, 1> {
    fake_scores.mean() - real_scores.mean() + gradient_penalty * lambda
}

/// Adversarial term of the generator objective: `-mean(critic(fake))`.
pub fn adversarial_loss<B: Backend>(fake_scores: Tensor<B, 2>) -> Tensor<B, 1> {
    fake_scores.mean().neg()
}

/// Mean absolute pixel error.
pub fn content_loss<B: Backend>(fake: Tensor<B, 4>, real: Tensor<B, 4>) -> Tensor<B, 1> {
    (fake - real).abs().mean()
}

/// Per-term breakdown of the generator objective.
pub struct GeneratorLoss<B: Backend> {
    pub total: Tensor<B, 1>,
    pub l1: Tensor<B, 1>,
    pub adversarial: Tensor<B, 1>,
}

impl GeneratorLossConfig {
    pub fn compute<B: Backend>(
        &self,
        fake: Tensor<B, 4>,
        real: Tensor<B, 4>,
        fake_scores: Tensor<B, 2>,
    ) -> GeneratorLoss<B> {
        let l1 = content_loss(fake, real);
        let adversarial = adversarial_loss(fake_scores);
        let total = l1.clone() * self.l1_weight + adversarial.clone() * self.adversarial_weight;

        GeneratorLoss {
            total,
            l1,
            adversarial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem()
    }

    #[test]
    fn critic_loss_rewards_separating_real_from_fake() {
        let device = Default::default();
        let real = Tensor::<TestBackend, 2>::from_floats([[2.0], [4.0]], &device);
        let fake = Tensor::<TestBackend, 2>::from_floats([[-1.0], [1.0]], &device);
        let gp = Tensor::<TestBackend, 1>::from_floats([0.5], &device);

        // -(3 - 0) + 10 * 0.5
        let loss = scalar(critic_loss(real, fake, gp, 10.0));
        assert!((loss - 2.0).abs() < 1e-6);
    }

    #[test]
    fn adversarial_loss_is_negated_mean() {
        let device = Default::default();
        let scores = Tensor::<TestBackend, 2>::from_floats([[1.0], [3.0]], &device);

        assert!((scalar(adversarial_loss(scores)) + 2.0).abs() < 1e-6);
    }

    #[test]
    fn content_loss_is_l1() {
        let device = Default::default();
        let fake = Tensor::<TestBackend, 4>::from_floats([[[[1.0, -1.0]]]], &device);
        let real = Tensor::<TestBackend, 4>::from_floats([[[[0.0, 0.0]]]], &device);

        assert!((scalar(content_loss(fake, real)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn generator_loss_weights_terms() {
        let device = Default::default();
        let fake = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);
        let real = Tensor::<TestBackend, 4>::zeros([1, 1, 2, 2], &device);
        let scores = Tensor::<TestBackend, 2>::from_floats([[-2.0]], &device);

        let loss = GeneratorLossConfig::new().compute(fake, real, scores);

        assert!((scalar(loss.l1) - 1.0).abs() < 1e-6);
        assert!((scalar(loss.adversarial) - 2.0).abs() < 1e-6);
        // 1e-2 * 1 + 5e-3 * 2
        assert!((scalar(loss.total) - 0.02).abs() < 1e-6);
    }
}
