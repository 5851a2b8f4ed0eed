pub mod config;
pub mod early_stopping;
pub mod metrics;
pub mod trainer;

pub use config::TrainingConfig;
pub use early_stopping::EarlyStopping;
pub use metrics::{psnr, EpochMetrics};
pub use trainer::{load_generator, GeneratorLosses, StepLosses, Trainer, Validation};
