pub mod conv;
pub mod dense;
pub mod rrdb;
pub mod upsample;

pub use conv::{leaky_relu_derivative, ConvBlock, LEAKY_SLOPE};
pub use dense::DenseResidualBlock;
pub use rrdb::RRDB;
pub use upsample::{Upsample2d, UpsampleBlock};
