pub mod blocks;
pub mod discriminator;
pub mod generator;
pub mod init;
pub mod loss;
pub mod penalty;

pub use blocks::{ConvBlock, DenseResidualBlock, Upsample2d, UpsampleBlock, RRDB};
pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use generator::{Generator, GeneratorConfig};
pub use init::{scaled_kaiming, DEFAULT_INIT_SCALE};
pub use loss::{adversarial_loss, content_loss, critic_loss, GeneratorLoss, GeneratorLossConfig};
pub use penalty::{
    gradient_penalty, input_gradient, penalty_at, Critic, FiniteDifference, GradientPenalty,
    GradientPenaltyConfig,
};
