use super::ConvBlock;
use burn::nn::Initializer;
use burn::prelude::*;

/// Number of convolutions in one dense block.
pub const DENSE_LAYERS: usize = 5;

/// Five densely connected 3x3 convolutions with a scaled residual.
///
/// Layer `i` sees the block input concatenated with the outputs of layers `0..i`,
/// i.e. `in_channels + growth * i` channels. The first four layers grow the
/// feature map by `growth` channels each; the last one projects back to
/// `in_channels` without an activation so the result can be added to the input.
#[derive(Module, Debug)]
pub struct DenseResidualBlock<B: Backend> {
    layers: Vec<ConvBlock<B>>,
    residual_beta: f64,
}

impl<B: Backend> DenseResidualBlock<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        growth: usize,
        residual_beta: f64,
        initializer: Initializer,
    ) -> Self {
        let layers = (0..DENSE_LAYERS)
            .map(|i| {
                let last = i == DENSE_LAYERS - 1;
                let out_channels = if last { in_channels } else { growth };
                ConvBlock::same(
                    device,
                    in_channels + growth * i,
                    out_channels,
                    !last,
                    initializer.clone(),
                )
            })
            .collect();

        Self {
            layers,
            residual_beta,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut features = vec![x.clone()];
        let mut out = x.clone();

        for layer in &self.layers {
            out = layer.forward(Tensor::cat(features.clone(), 1));
            features.push(out.clone());
        }

        out * self.residual_beta + x
    }
}
