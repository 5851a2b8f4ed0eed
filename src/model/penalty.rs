use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Distribution;

/// Settings of the WGAN-GP regulariser.
#[derive(Config, Debug)]
pub struct GradientPenaltyConfig {
    /// Weight of the penalty in the critic loss.
    #[config(default = 10.0)]
    pub lambda: f64,
    /// Largest relative gap between a critic's directional derivative and the
    /// exact gradient norm before that sample's slope is frozen.
    #[config(default = 0.05)]
    pub tolerance: f64,
}

/// A scoring network the gradient penalty can be applied to.
pub trait Critic<B: Backend> {
    /// [B, C, H, W] -> [B, 1]
    fn score(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Derivative of each sample's score at `x` along `direction`: [B].
    ///
    /// Must stay differentiable with respect to the critic parameters.
    fn directional_derivative(&self, x: Tensor<B, 4>, direction: Tensor<B, 4>) -> Tensor<B, 1>;
}

/// Any score function, differentiated by central differences with step `epsilon`.
///
/// The difference of two scores loses all precision once `epsilon * ||g||`
/// approaches the round-off of the scores themselves. [`penalty_at`] detects
/// this and freezes those samples.
pub struct FiniteDifference<F> {
    critic: F,
    epsilon: f64,
}

impl<F> FiniteDifference<F> {
    pub fn new(critic: F, epsilon: f64) -> Self {
        Self { critic, epsilon }
    }
}

impl<B, F> Critic<B> for FiniteDifference<F>
where
    B: Backend,
    F: Fn(Tensor<B, 4>) -> Tensor<B, 2>,
{
    fn score(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        (self.critic)(x)
    }

    fn directional_derivative(&self, x: Tensor<B, 4>, direction: Tensor<B, 4>) -> Tensor<B, 1> {
        let [batch, _, _, _] = x.dims();
        let step = direction * self.epsilon;

        let forward = (self.critic)(x.clone() + step.clone());
        let backward = (self.critic)(x - step);
        (forward - backward).reshape([batch]) / (2.0 * self.epsilon)
    }
}

/// Result of [`gradient_penalty`].
#[derive(Debug, Clone)]
pub struct GradientPenalty<B: AutodiffBackend> {
    /// Differentiable penalty, to be added to the critic loss.
    pub loss: Tensor<B, 1>,
    /// Per-sample input-gradient norms at the interpolated points.
    pub norms: Tensor<B::InnerBackend, 1>,
    /// Per-sample directional derivatives reported by the critic.
    pub slopes: Tensor<B::InnerBackend, 1>,
    /// Samples whose slope disagreed with the exact norm and was replaced by it.
    pub frozen: usize,
}

impl<B: AutodiffBackend> GradientPenalty<B> {
    /// Penalty computed from the exact input-gradient norms: `mean((||g|| - 1)^2)`.
    pub fn exact(&self) -> f32 {
        (self.norms.clone() - 1.0)
            .powf_scalar(2.0)
            .mean()
            .into_scalar()
            .elem()
    }
}

/// Gradient of `sum(critic(x))` with respect to `x`.
///
/// Inputs the critic ignores get a zero gradient.
pub fn input_gradient<B, F>(critic: F, x: Tensor<B, 4>) -> Tensor<B::InnerBackend, 4>
where
    B: AutodiffBackend,
    F: Fn(Tensor<B, 4>) -> Tensor<B, 2>,
{
    let x = x.detach().require_grad();
    let grads = critic(x.clone()).sum().backward();

    match x.grad(&grads) {
        Some(grad) => grad,
        None => x.inner().zeros_like(),
    }
}

/// Per-sample L2 norm of a batch of gradients: [B, C, H, W] -> [B].
pub fn gradient_norms<B: Backend>(gradient: Tensor<B, 4>) -> Tensor<B, 1> {
    let [batch, _, _, _] = gradient.dims();

    gradient
        .flatten::<2>(1, 3)
        .powf_scalar(2.0)
        .sum_dim(1)
        .sqrt()
        .reshape([batch])
}

/// Random per-sample blend `real * alpha + fake * (1 - alpha)`, alpha ~ U(0, 1).
///
/// `fake` is detached so the penalty never reaches the generator.
pub fn interpolate<B: Backend>(real: Tensor<B, 4>, fake: Tensor<B, 4>) -> Tensor<B, 4> {
    let [batch, _, _, _] = real.dims();
    let alpha = Tensor::<B, 4>::random(
        [batch, 1, 1, 1],
        Distribution::Uniform(0.0, 1.0),
        &real.device(),
    );

    real * alpha.clone() + fake.detach() * (alpha.neg() + 1.0)
}

/// WGAN-GP penalty on random interpolations between `real` and `fake`.
pub fn gradient_penalty<B, C>(
    critic: &C,
    real: Tensor<B, 4>,
    fake: Tensor<B, 4>,
    tolerance: f64,
) -> GradientPenalty<B>
where
    B: AutodiffBackend,
    C: Critic<B>,
{
    penalty_at(critic, interpolate(real, fake), tolerance)
}

/// Gradient penalty at fixed points `x`.
///
/// The exact input gradient `g` is computed first. The autodiff graph does not
/// extend through that backward pass, so the trainable term uses the critic's
/// derivative along the fixed unit direction `u = g / ||g||`:
/// `d = u . grad_x critic(x)`, which equals `||g||` and whose parameter
/// gradient is that of `||g||`. The loss is `mean((d - 1)^2)`.
///
/// A sample whose `d` is off from `||g||` by more than `tolerance * ||g||` (or
/// is not finite) is replaced by the exact norm with no parameter gradient.
pub fn penalty_at<B, C>(critic: &C, x: Tensor<B, 4>, tolerance: f64) -> GradientPenalty<B>
where
    B: AutodiffBackend,
    C: Critic<B>,
{
    let x = x.detach();
    let [batch, channels, height, width] = x.dims();

    let gradient = input_gradient(|x| critic.score(x), x.clone());
    let norms = gradient_norms(gradient.clone());

    // Zero gradients stay zero instead of dividing by zero.
    let direction = gradient.flatten::<2>(1, 3)
        / norms.clone().reshape([batch, 1]).clamp_min(f32::MIN_POSITIVE);
    let direction: Tensor<B, 4> =
        Tensor::from_inner(direction.reshape([batch, channels, height, width]));

    let slopes = critic.directional_derivative(x, direction);
    let measured = slopes.clone().inner();

    let exact: Tensor<B, 1> = Tensor::from_inner(norms.clone());
    let untrusted = (slopes.clone() - exact.clone())
        .abs()
        .lower_equal(exact.clone() * tolerance)
        .bool_not();
    let frozen = untrusted.clone().int().sum().into_scalar().elem::<i64>() as usize;
    if frozen > 0 {
        log::debug!(
            "gradient penalty: {}/{} slopes off the exact norm, using the norm without gradient",
            frozen,
            batch
        );
    }
    let slopes = slopes.mask_where(untrusted, exact);

    let loss = (slopes - 1.0).powf_scalar(2.0).mean();

    log::debug!(
        "gradient penalty: surrogate={:.5} mean_norm={:.5}",
        loss.clone().into_scalar().elem::<f32>(),
        norms.clone().mean().into_scalar().elem::<f32>()
    );

    GradientPenalty {
        loss,
        norms,
        slopes: measured,
        frozen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiscriminatorConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::{AdamConfig, GradientsParams, Optimizer};

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    const TOLERANCE: f64 = 0.05;

    fn values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    /// critic(x) = sum(w * x) per sample, so the input gradient is `w` everywhere.
    fn linear_critic(
        weight: Tensor<TestAutodiffBackend, 4>,
    ) -> impl Fn(Tensor<TestAutodiffBackend, 4>) -> Tensor<TestAutodiffBackend, 2> {
        move |x| (x * weight.clone()).flatten::<2>(1, 3).sum_dim(1)
    }

    #[test]
    fn input_gradient_of_linear_critic_is_its_weight() {
        let device = Default::default();
        let weight = Tensor::<TestAutodiffBackend, 4>::from_floats(
            [[[[1.0, -2.0], [0.5, 3.0]]]],
            &device,
        );
        let x = Tensor::<TestAutodiffBackend, 4>::random(
            [3, 1, 2, 2],
            Distribution::Default,
            &device,
        );

        let gradient = input_gradient(linear_critic(weight), x);

        assert_eq!(gradient.dims(), [3, 1, 2, 2]);
        let expected = [1.0, -2.0, 0.5, 3.0];
        for (i, v) in values(gradient).into_iter().enumerate() {
            assert!((v - expected[i % 4]).abs() < 1e-6);
        }
    }

    #[test]
    fn input_gradient_is_zero_when_critic_ignores_input() {
        let device = Default::default();
        let x = Tensor::<TestAutodiffBackend, 4>::ones([2, 3, 2, 2], &device);
        let bias = Tensor::<TestAutodiffBackend, 2>::ones([2, 1], &device).require_grad();

        let gradient = input_gradient(move |_x| bias.clone(), x);

        assert!(values(gradient).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn norms_are_per_sample() {
        let device = Default::default();
        let gradient = Tensor::<TestBackend, 4>::from_floats(
            [[[[3.0, 4.0]]], [[[0.0, 0.0]]], [[[1.0, 0.0]]]],
            &device,
        );

        let norms = values(gradient_norms(gradient));

        assert_eq!(norms.len(), 3);
        assert!((norms[0] - 5.0).abs() < 1e-6);
        assert!(norms[1].abs() < 1e-6);
        assert!((norms[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn interpolation_stays_between_endpoints() {
        let device = Default::default();
        let real = Tensor::<TestBackend, 4>::ones([4, 3, 2, 2], &device);
        let fake = Tensor::<TestBackend, 4>::zeros([4, 3, 2, 2], &device);

        let mixed = values(interpolate(real, fake));

        // Each sample is a constant alpha in [0, 1] over all of its pixels.
        for sample in mixed.chunks(12) {
            assert!(sample.iter().all(|v| (0.0..=1.0).contains(v)));
            assert!(sample.iter().all(|v| (v - sample[0]).abs() < 1e-6));
        }
    }

    /// Shallow critic with unit init scale, so its input-gradient norms are order one.
    fn narrow_critic(device: &<TestAutodiffBackend as Backend>::Device) -> crate::model::Discriminator<TestAutodiffBackend> {
        DiscriminatorConfig::new()
            .with_features(vec![4, 4])
            .with_hidden(8)
            .with_init_scale(1.0)
            .init::<TestAutodiffBackend>(device)
    }

    #[test]
    fn unit_norm_linear_critic_has_no_penalty() {
        let device = Default::default();
        // ||w|| = sqrt(0.36 + 0.64) = 1
        let weight =
            Tensor::<TestAutodiffBackend, 4>::from_floats([[[[0.6, 0.8]]]], &device);
        let real = Tensor::<TestAutodiffBackend, 4>::random([4, 1, 1, 2], Distribution::Default, &device);
        let fake = Tensor::<TestAutodiffBackend, 4>::random([4, 1, 1, 2], Distribution::Default, &device);
        let critic = FiniteDifference::new(linear_critic(weight), 1e-2);

        let penalty = gradient_penalty(&critic, real, fake, TOLERANCE);

        assert_eq!(penalty.frozen, 0);
        assert!(penalty.exact().abs() < 1e-6);
        assert!(penalty.loss.into_scalar().elem::<f32>().abs() < 1e-4);
    }

    #[test]
    fn linear_critic_penalty_matches_closed_form() {
        let device = Default::default();
        // ||w|| = 3, so every sample contributes (3 - 1)^2 = 4.
        let weight = Tensor::<TestAutodiffBackend, 4>::from_floats(
            [[[[2.0, 1.0], [2.0, 0.0]]]],
            &device,
        );
        let real = Tensor::<TestAutodiffBackend, 4>::random([5, 1, 2, 2], Distribution::Default, &device);
        let fake = Tensor::<TestAutodiffBackend, 4>::random([5, 1, 2, 2], Distribution::Default, &device);
        let critic = FiniteDifference::new(linear_critic(weight), 1e-2);

        let penalty = gradient_penalty(&critic, real, fake, TOLERANCE);

        assert!((penalty.exact() - 4.0).abs() < 1e-4);
        let surrogate: f32 = penalty.loss.into_scalar().elem();
        assert!((surrogate - 4.0).abs() < 1e-2, "surrogate {surrogate}");
    }

    #[test]
    fn finite_difference_tracks_exact_penalty_for_curved_critic() {
        // critic(x) = 0.5 * ||x||^2 has gradient x, and the central difference
        // of a quadratic is exact: the slope is ||x||.
        let device = Default::default();
        let critic = FiniteDifference::new(
            |x: Tensor<TestAutodiffBackend, 4>| x.powf_scalar(2.0).flatten::<2>(1, 3).sum_dim(1) * 0.5,
            1e-2,
        );
        let real = Tensor::<TestAutodiffBackend, 4>::random([3, 2, 3, 3], Distribution::Uniform(0.5, 2.0), &device);
        let fake = Tensor::<TestAutodiffBackend, 4>::random([3, 2, 3, 3], Distribution::Uniform(0.5, 2.0), &device);

        let penalty = gradient_penalty(&critic, real, fake, TOLERANCE);

        let exact = penalty.exact();
        let surrogate: f32 = penalty.loss.into_scalar().elem();
        assert_eq!(penalty.frozen, 0);
        assert!(exact > 0.0);
        assert!(
            (surrogate - exact).abs() / exact < 1e-2,
            "surrogate {surrogate} vs exact {exact}"
        );
    }

    #[test]
    fn zero_gradient_samples_count_fully() {
        let device = Default::default();
        let real = Tensor::<TestAutodiffBackend, 4>::ones([2, 1, 2, 2], &device);
        let fake = Tensor::<TestAutodiffBackend, 4>::zeros([2, 1, 2, 2], &device);
        let critic = FiniteDifference::new(
            |x: Tensor<TestAutodiffBackend, 4>| {
                let [batch, _, _, _] = x.dims();
                let device = x.device();
                x.flatten::<2>(1, 3).sum_dim(1) * 0.0 + Tensor::ones([batch, 1], &device)
            },
            1e-2,
        );

        let penalty = gradient_penalty(&critic, real, fake, TOLERANCE);

        assert!((penalty.exact() - 1.0).abs() < 1e-6);
        assert!((penalty.loss.into_scalar().elem::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn discriminator_slopes_match_exact_norms_at_default_scale() {
        // Default depth and init: input-gradient norms start around 1e-10.
        let device = Default::default();
        let critic = DiscriminatorConfig::new().init::<TestAutodiffBackend>(&device);
        let real = Tensor::<TestAutodiffBackend, 4>::random([2, 3, 32, 32], Distribution::Uniform(0.0, 1.0), &device);
        let fake = Tensor::<TestAutodiffBackend, 4>::random([2, 3, 32, 32], Distribution::Uniform(0.0, 1.0), &device);

        let penalty = gradient_penalty(&critic, real, fake, TOLERANCE);

        assert_eq!(penalty.frozen, 0);
        let norms = values(penalty.norms.clone());
        let slopes = values(penalty.slopes.clone());
        for (slope, norm) in slopes.iter().zip(norms.iter()) {
            assert!(*norm > 0.0);
            assert!(
                (slope - norm).abs() <= 1e-3 * norm,
                "slope {slope:e} vs norm {norm:e}"
            );
        }
        let exact = penalty.exact();
        let surrogate: f32 = penalty.loss.into_scalar().elem();
        assert!((surrogate - exact).abs() < 1e-5);
    }

    #[test]
    fn finite_difference_on_default_critic_is_frozen_to_exact_norm() {
        let device = Default::default();
        let critic = DiscriminatorConfig::new().init::<TestAutodiffBackend>(&device);
        let wrapped =
            FiniteDifference::new(|x: Tensor<TestAutodiffBackend, 4>| critic.forward(x), 1e-2);
        let real = Tensor::<TestAutodiffBackend, 4>::random([2, 3, 32, 32], Distribution::Uniform(0.0, 1.0), &device);
        let fake = Tensor::<TestAutodiffBackend, 4>::random([2, 3, 32, 32], Distribution::Uniform(0.0, 1.0), &device);

        let penalty = gradient_penalty(&wrapped, real, fake, TOLERANCE);

        // Score differences are round-off at this gradient scale.
        assert_eq!(penalty.frozen, 2);
        let exact = penalty.exact();
        let surrogate: f32 = penalty.loss.into_scalar().elem();
        assert!((surrogate - exact).abs() < 1e-5);
    }

    #[test]
    fn penalty_step_lowers_exact_penalty() {
        let device = Default::default();
        let critic = narrow_critic(&device);
        let x = Tensor::<TestAutodiffBackend, 4>::random([2, 3, 12, 12], Distribution::Uniform(0.0, 1.0), &device);

        let penalty = penalty_at(&critic, x.clone(), TOLERANCE);
        let before = penalty.exact();
        assert_eq!(penalty.frozen, 0);
        assert_eq!(penalty.norms.dims(), [2]);

        // Adam's first step moves every parameter by about lr against the sign
        // of its gradient, so only a correct gradient direction lowers the penalty.
        let grads = GradientsParams::from_grads(penalty.loss.backward(), &critic);
        let mut optim = AdamConfig::new().init();
        let critic = optim.step(1e-4, critic, grads);

        let after = penalty_at(&critic, x, TOLERANCE).exact();
        assert!(after < before, "penalty went from {before} to {after}");
    }
}
