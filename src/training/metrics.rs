use burn::prelude::*;

/// Peak signal-to-noise ratio in dB over the whole batch.
///
/// Identical images give `f32::INFINITY`.
pub fn psnr<B: Backend>(fake: Tensor<B, 4>, real: Tensor<B, 4>, max_value: f32) -> f32 {
    let mse: f32 = (fake - real).powf_scalar(2.0).mean().into_scalar().elem();

    if mse <= 0.0 {
        return f32::INFINITY;
    }
    10.0 * (max_value * max_value / mse).log10()
}

/// Running averages of per-step losses over an epoch.
///
/// Critic and generator terms are averaged over their own update counts, since
/// a step can update the critic and then skip the generator.
#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    pub critic_loss: f32,
    pub gradient_penalty: f32,
    pub generator_loss: f32,
    pub l1: f32,
    pub adversarial: f32,
    pub critic_steps: usize,
    pub generator_steps: usize,
}

impl EpochMetrics {
    pub fn record(&mut self, step: &super::StepLosses) {
        self.critic_loss += step.critic;
        self.gradient_penalty += step.gradient_penalty;
        self.critic_steps += 1;

        if let Some(generator) = &step.generator {
            self.generator_loss += generator.total;
            self.l1 += generator.l1;
            self.adversarial += generator.adversarial;
            self.generator_steps += 1;
        }
    }

    pub fn mean(&self) -> Self {
        let critic_n = self.critic_steps.max(1) as f32;
        let generator_n = self.generator_steps.max(1) as f32;
        Self {
            critic_loss: self.critic_loss / critic_n,
            gradient_penalty: self.gradient_penalty / critic_n,
            generator_loss: self.generator_loss / generator_n,
            l1: self.l1 / generator_n,
            adversarial: self.adversarial / generator_n,
            critic_steps: self.critic_steps,
            generator_steps: self.generator_steps,
        }
    }
}
