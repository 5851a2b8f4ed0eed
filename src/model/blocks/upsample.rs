use super::ConvBlock;
use burn::nn::Initializer;
use burn::prelude::*;

/// Nearest-neighbour upsampling by an integer factor.
#[derive(Module, Debug, Clone)]
pub struct Upsample2d {
    scale_factor: usize,
}

impl Upsample2d {
    pub fn new(scale_factor: usize) -> Self {
        Self { scale_factor }
    }

    /// [B, C, H, W] -> [B, C, H*scale, W*scale]
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, height, width] = x.dims();
        let scale = self.scale_factor;

        // Insert unit axes next to H and W, repeat them, fold them back in.
        x.reshape([batch, channels, height, 1, width, 1])
            .repeat_dim(3, scale)
            .repeat_dim(5, scale)
            .reshape([batch, channels, height * scale, width * scale])
    }
}

/// Nearest upsample, then a channel-preserving 3x3 conv with LeakyReLU.
#[derive(Module, Debug)]
pub struct UpsampleBlock<B: Backend> {
    upsample: Upsample2d,
    conv: ConvBlock<B>,
}

impl<B: Backend> UpsampleBlock<B> {
    pub fn new(
        device: &B::Device,
        channels: usize,
        scale_factor: usize,
        initializer: Initializer,
    ) -> Self {
        Self {
            upsample: Upsample2d::new(scale_factor),
            conv: ConvBlock::same(device, channels, channels, true, initializer),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(self.upsample.forward(x))
    }
}
