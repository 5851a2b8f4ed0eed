use super::blocks::{leaky_relu_derivative, ConvBlock, LEAKY_SLOPE};
use super::penalty::Critic;
use super::init::scaled_kaiming;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::leaky_relu;

/// Spatial size the feature map is pooled to before the classifier.
const POOLED: usize = 6;

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    #[config(default = 3)]
    pub in_channels: usize,
    /// Output channels of each conv block. Odd-indexed blocks use stride 2.
    #[config(default = "vec![64, 64, 128, 128, 256, 256, 512, 512]")]
    pub features: Vec<usize>,
    /// Width of the hidden classifier layer.
    #[config(default = 1024)]
    pub hidden: usize,
    #[config(default = 0.1)]
    pub init_scale: f64,
}

/// VGG-style critic producing one unbounded score per image.
///
/// No sigmoid is applied: the scores are used directly as a Wasserstein
/// estimate and regularised with a gradient penalty.
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    pool: AdaptiveAvgPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
}

impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        let init = scaled_kaiming(self.init_scale);

        let mut in_channels = self.in_channels;
        let mut blocks = Vec::with_capacity(self.features.len());
        for (idx, &feature) in self.features.iter().enumerate() {
            blocks.push(ConvBlock::new(
                device,
                in_channels,
                feature,
                3,
                1 + idx % 2,
                true,
                init.clone(),
            ));
            in_channels = feature;
        }

        Discriminator {
            blocks,
            pool: AdaptiveAvgPool2dConfig::new([POOLED, POOLED]).init(),
            fc1: LinearConfig::new(in_channels * POOLED * POOLED, self.hidden)
                .with_initializer(init.clone())
                .init(device),
            fc2: LinearConfig::new(self.hidden, 1)
                .with_initializer(init)
                .init(device),
        }
    }

    /// Total downsampling of the conv body.
    pub fn total_stride(&self) -> usize {
        (0..self.features.len()).map(|idx| 1 + idx % 2).product()
    }
}

impl<B: Backend> Discriminator<B> {
    /// [B, C, H, W] -> [B, 1]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self
            .blocks
            .iter()
            .fold(x, |acc, block| block.forward(acc));

        let x = self.pool.forward(x);
        let x = x.flatten::<2>(1, 3);
        let x = leaky_relu(self.fc1.forward(x), LEAKY_SLOPE);
        self.fc2.forward(x)
    }

    /// Scores together with their derivative along `tangent`, both [B, 1].
    ///
    /// Every layer is linear or LeakyReLU, so the derivative is the tangent
    /// pushed through the weights with the primal activation slopes. No bias
    /// enters the tangent path and no scores are subtracted, so tiny input
    /// gradients keep full relative precision.
    pub fn forward_with_tangent(
        &self,
        x: Tensor<B, 4>,
        tangent: Tensor<B, 4>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let (x, tangent) = self
            .blocks
            .iter()
            .fold((x, tangent), |(x, t), block| block.forward_with_tangent(x, t));

        let x = self.pool.forward(x).flatten::<2>(1, 3);
        let tangent = self.pool.forward(tangent).flatten::<2>(1, 3);

        let x = self.fc1.forward(x);
        let tangent = tangent.matmul(self.fc1.weight.val()) * leaky_relu_derivative(x.clone());
        let x = leaky_relu(x, LEAKY_SLOPE);

        let tangent = tangent.matmul(self.fc2.weight.val());
        (self.fc2.forward(x), tangent)
    }
}

impl<B: Backend> Critic<B> for Discriminator<B> {
    fn score(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(x)
    }

    fn directional_derivative(&self, x: Tensor<B, 4>, direction: Tensor<B, 4>) -> Tensor<B, 1> {
        let [batch, _, _, _] = x.dims();
        let (_, slope) = self.forward_with_tangent(x, direction);
        slope.reshape([batch])
    }
}
