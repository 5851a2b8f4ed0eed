use super::blocks::{ConvBlock, UpsampleBlock, RRDB};
use super::init::scaled_kaiming;
use burn::prelude::*;

/// Upsampling factor of each upsample stage; two stages give 4x.
const STAGE_SCALE: usize = 2;

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Image channels, both in and out.
    #[config(default = 3)]
    pub in_channels: usize,
    /// Feature width of the trunk.
    #[config(default = 64)]
    pub num_channels: usize,
    /// Number of RRDBs in the trunk.
    #[config(default = 23)]
    pub num_blocks: usize,
    /// Channels added by each layer of a dense block.
    #[config(default = 32)]
    pub growth_channels: usize,
    #[config(default = 0.2)]
    pub residual_beta: f64,
    /// Multiplier on the Kaiming-normal weights.
    #[config(default = 0.1)]
    pub init_scale: f64,
}

/// RRDB trunk with a long skip connection, followed by two 2x nearest
/// upsample stages and a two-layer reconstruction head.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    initial: ConvBlock<B>,
    residuals: Vec<RRDB<B>>,
    conv: ConvBlock<B>,
    upsamples: Vec<UpsampleBlock<B>>,
    final_hidden: ConvBlock<B>,
    final_out: ConvBlock<B>,
}

impl GeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let init = scaled_kaiming(self.init_scale);
        let c = self.num_channels;

        let residuals = (0..self.num_blocks)
            .map(|_| {
                RRDB::new(
                    device,
                    c,
                    self.growth_channels,
                    self.residual_beta,
                    init.clone(),
                )
            })
            .collect();

        Generator {
            initial: ConvBlock::same(device, self.in_channels, c, false, init.clone()),
            residuals,
            conv: ConvBlock::same(device, c, c, false, init.clone()),
            upsamples: vec![
                UpsampleBlock::new(device, c, STAGE_SCALE, init.clone()),
                UpsampleBlock::new(device, c, STAGE_SCALE, init.clone()),
            ],
            final_hidden: ConvBlock::same(device, c, c, true, init.clone()),
            final_out: ConvBlock::same(device, c, self.in_channels, false, init),
        }
    }
}

impl<B: Backend> Generator<B> {
    /// [B, C, H, W] -> [B, C, 4H, 4W]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let initial = self.initial.forward(x);

        let trunk = self
            .residuals
            .iter()
            .fold(initial.clone(), |acc, block| block.forward(acc));
        let x = self.conv.forward(trunk) + initial;

        let x = self
            .upsamples
            .iter()
            .fold(x, |acc, block| block.forward(acc));

        self.final_out.forward(self.final_hidden.forward(x))
    }

    /// Channels of the images the generator consumes and produces.
    pub fn in_channels(&self) -> usize {
        self.initial.in_channels()
    }

    /// Total spatial upscaling applied by [`Generator::forward`].
    pub fn scale_factor(&self) -> usize {
        STAGE_SCALE.pow(self.upsamples.len() as u32)
    }
}
