use super::DenseResidualBlock;
use burn::nn::Initializer;
use burn::prelude::*;

/// Dense blocks per RRDB.
pub const RRDB_DEPTH: usize = 3;

/// Residual-in-residual dense block: three dense blocks in sequence, the whole
/// chain wrapped in another scaled residual.
#[derive(Module, Debug)]
pub struct RRDB<B: Backend> {
    blocks: Vec<DenseResidualBlock<B>>,
    residual_beta: f64,
}

impl<B: Backend> RRDB<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        growth: usize,
        residual_beta: f64,
        initializer: Initializer,
    ) -> Self {
        let blocks = (0..RRDB_DEPTH)
            .map(|_| {
                DenseResidualBlock::new(
                    device,
                    in_channels,
                    growth,
                    residual_beta,
                    initializer.clone(),
                )
            })
            .collect();

        Self {
            blocks,
            residual_beta,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self
            .blocks
            .iter()
            .fold(x.clone(), |acc, block| block.forward(acc));

        out * self.residual_beta + x
    }
}
