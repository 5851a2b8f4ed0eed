pub mod model;
pub mod data;
pub mod training;

// Re-exports for convenience
pub use model::{
    gradient_penalty, Discriminator, DiscriminatorConfig, Generator, GeneratorConfig,
    GradientPenalty, RRDB,
};
pub use data::{SrBatch, SrDataLoader, SrDataset};
pub use training::{EarlyStopping, StepLosses, Trainer, TrainingConfig};
