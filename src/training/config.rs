use crate::data::UPSCALE;
use crate::model::{
    DiscriminatorConfig, GeneratorConfig, GeneratorLossConfig, GradientPenaltyConfig,
    DEFAULT_INIT_SCALE,
};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    // Dataset
    pub data_dir: String,
    pub val_dir: Option<String>,
    pub high_res: usize,
    pub augment: bool,

    // Training
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub beta_1: f32,
    pub beta_2: f32,

    // Loss weights
    pub lambda_gp: f64,
    pub gp_tolerance: f64,
    pub l1_weight: f64,
    pub adversarial_weight: f64,

    // Model
    pub in_channels: usize,
    pub num_channels: usize,
    pub num_blocks: usize,
    pub growth_channels: usize,
    pub critic_features: Vec<usize>,
    pub critic_hidden: usize,
    pub init_scale: f64,

    // Early stopping
    pub patience: usize,
    pub min_delta: f32,

    // Checkpointing
    pub save_dir: String,
    pub save_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/train".to_string(),
            val_dir: None,
            high_res: 128,
            augment: true,
            epochs: 100,
            batch_size: 16,
            learning_rate: 1e-4,
            beta_1: 0.0,
            beta_2: 0.9,
            lambda_gp: 10.0,
            gp_tolerance: 0.05,
            l1_weight: 1e-2,
            adversarial_weight: 5e-3,
            in_channels: 3,
            num_channels: 64,
            num_blocks: 23,
            growth_channels: 32,
            critic_features: vec![64, 64, 128, 128, 256, 256, 512, 512],
            critic_hidden: 1024,
            init_scale: DEFAULT_INIT_SCALE,
            patience: 0,
            min_delta: 1e-3,
            save_dir: "runs/train".to_string(),
            save_interval: 10,
        }
    }
}

impl TrainingConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TrainingConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.high_res == 0 || self.high_res % UPSCALE != 0 {
            return Err(anyhow!(
                "high_res must be a positive multiple of {}, got {}",
                UPSCALE,
                self.high_res
            ));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        if self.critic_features.is_empty() {
            return Err(anyhow!("critic_features must not be empty"));
        }
        if self.gp_tolerance <= 0.0 {
            return Err(anyhow!("gp_tolerance must be positive"));
        }
        Ok(())
    }

    pub fn low_res(&self) -> usize {
        self.high_res / UPSCALE
    }

    pub fn generator(&self) -> GeneratorConfig {
        GeneratorConfig::new()
            .with_in_channels(self.in_channels)
            .with_num_channels(self.num_channels)
            .with_num_blocks(self.num_blocks)
            .with_growth_channels(self.growth_channels)
            .with_init_scale(self.init_scale)
    }

    pub fn critic(&self) -> DiscriminatorConfig {
        DiscriminatorConfig::new()
            .with_in_channels(self.in_channels)
            .with_features(self.critic_features.clone())
            .with_hidden(self.critic_hidden)
            .with_init_scale(self.init_scale)
    }

    pub fn gradient_penalty(&self) -> GradientPenaltyConfig {
        GradientPenaltyConfig::new()
            .with_lambda(self.lambda_gp)
            .with_tolerance(self.gp_tolerance)
    }

    pub fn generator_loss(&self) -> GeneratorLossConfig {
        GeneratorLossConfig::new()
            .with_l1_weight(self.l1_weight)
            .with_adversarial_weight(self.adversarial_weight)
    }
}
