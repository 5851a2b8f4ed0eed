use crate::data::{SrBatch, SrDataLoader, SrDataset};
use crate::model::{
    content_loss, critic_loss, gradient_penalty, Discriminator, Generator, GeneratorLossConfig,
    GradientPenaltyConfig,
};
use crate::training::metrics::{psnr, EpochMetrics};
use crate::training::{EarlyStopping, TrainingConfig};
use anyhow::{anyhow, Result};
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

/// Generator terms of one training step.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorLosses {
    pub total: f32,
    pub l1: f32,
    pub adversarial: f32,
}

/// Losses of one critic + generator update.
#[derive(Debug, Clone, Copy)]
pub struct StepLosses {
    pub critic: f32,
    /// Gradient penalty that was optimised.
    pub gradient_penalty: f32,
    /// `None` when the generator loss was not finite and its update was skipped.
    pub generator: Option<GeneratorLosses>,
}

/// Validation results of one epoch.
#[derive(Debug, Clone, Copy)]
pub struct Validation {
    pub l1: f32,
    pub psnr: f32,
}

pub struct Trainer<B: AutodiffBackend> {
    pub generator: Generator<B>,
    pub critic: Discriminator<B>,
    config: TrainingConfig,
    generator_loss: GeneratorLossConfig,
    penalty: GradientPenaltyConfig,
    device: B::Device,
    early_stopping: EarlyStopping,
    generator_optim: OptimizerAdaptor<Adam, Generator<B>, B>,
    critic_optim: OptimizerAdaptor<Adam, Discriminator<B>, B>,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device) -> Self {
        let generator = config.generator().init(&device);
        let critic = config.critic().init(&device);
        let generator_loss = config.generator_loss();
        let penalty = config.gradient_penalty();
        let early_stopping = EarlyStopping::new(config.patience, config.min_delta);

        let adam = AdamConfig::new()
            .with_beta_1(config.beta_1)
            .with_beta_2(config.beta_2);

        Self {
            generator,
            critic,
            generator_loss,
            penalty,
            device,
            early_stopping,
            generator_optim: adam.init(),
            critic_optim: adam.init(),
            config,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// One critic update followed by one generator update.
    ///
    /// Returns `None` when the critic loss is not finite, in which case neither
    /// network changes. A non-finite generator loss skips only the generator update.
    pub fn train_step(&mut self, batch: SrBatch<B>) -> Option<StepLosses> {
        let lr = self.config.learning_rate;
        let fake = self.generator.forward(batch.low_res);

        // Critic: -(E[D(real)] - E[D(fake)]) + lambda * GP
        let detached = fake.clone().detach();
        let real_scores = self.critic.forward(batch.high_res.clone());
        let fake_scores = self.critic.forward(detached.clone());
        let penalty = gradient_penalty(
            &self.critic,
            batch.high_res.clone(),
            detached,
            self.penalty.tolerance,
        );
        let gp_value: f32 = penalty.loss.clone().into_scalar().elem();
        let loss_critic = critic_loss(
            real_scores,
            fake_scores,
            penalty.loss,
            self.penalty.lambda,
        );
        let critic_value: f32 = loss_critic.clone().into_scalar().elem();

        if !critic_value.is_finite() {
            log::warn!("Non-finite critic loss {critic_value}, skipping step");
            return None;
        }

        let grads = loss_critic.backward();
        let grads = GradientsParams::from_grads(grads, &self.critic);
        self.critic = self.critic_optim.step(lr, self.critic.clone(), grads);

        // Generator: l1_weight * L1 + adversarial_weight * -E[D(G(lr))]
        let fake_scores = self.critic.forward(fake.clone());
        let loss = self
            .generator_loss
            .compute(fake, batch.high_res, fake_scores);
        let generator_value: f32 = loss.total.clone().into_scalar().elem();

        let generator = if generator_value.is_finite() {
            let losses = GeneratorLosses {
                total: generator_value,
                l1: loss.l1.into_scalar().elem(),
                adversarial: loss.adversarial.into_scalar().elem(),
            };
            let grads = loss.total.backward();
            let grads = GradientsParams::from_grads(grads, &self.generator);
            self.generator = self.generator_optim.step(lr, self.generator.clone(), grads);
            Some(losses)
        } else {
            log::warn!("Non-finite generator loss {generator_value}, skipping generator update");
            None
        };

        Some(StepLosses {
            critic: critic_value,
            gradient_penalty: gp_value,
            generator,
        })
    }

    pub fn train(&mut self) -> Result<()> {
        log::info!("Starting ESRGAN training");
        self.config.validate()?;

        let train_dataset =
            SrDataset::new(&self.config.data_dir, self.config.high_res, self.config.augment)?;
        let val_dataset = match &self.config.val_dir {
            Some(dir) => Some(SrDataset::new(dir, self.config.high_res, false)?),
            None => None,
        };

        log::info!("Train: {} images", train_dataset.len());
        if let Some(val) = &val_dataset {
            log::info!("Val: {} images", val.len());
        }

        std::fs::create_dir_all(&self.config.save_dir)?;

        let pb = ProgressBar::new(self.config.epochs as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?,
        );

        for epoch in 1..=self.config.epochs {
            let epoch_start = Instant::now();

            let metrics = self.train_epoch(&train_dataset);
            log::info!(
                "Epoch {}: critic={:.4} gp={:.4} generator={:.4} l1={:.4} adv={:.4} ({}/{} steps, {:.1}s)",
                epoch,
                metrics.critic_loss,
                metrics.gradient_penalty,
                metrics.generator_loss,
                metrics.l1,
                metrics.adversarial,
                metrics.generator_steps,
                metrics.critic_steps,
                epoch_start.elapsed().as_secs_f32()
            );

            let mut message = format!(
                "Epoch {}: D={:.4}, G={:.4}",
                epoch, metrics.critic_loss, metrics.generator_loss
            );

            let mut stop = false;
            if let Some(val) = &val_dataset {
                let validation = self.validate(val);
                message.push_str(&format!(", PSNR={:.2}dB", validation.psnr));
                log::info!(
                    "Epoch {}: val_l1={:.4} val_psnr={:.2}dB",
                    epoch,
                    validation.l1,
                    validation.psnr
                );

                if self.early_stopping.is_improvement(validation.l1) {
                    log::info!("Validation loss improved, saving best checkpoint");
                    self.save_checkpoint("best")?;
                }
                stop = self.early_stopping.should_stop(validation.l1);
            }

            pb.set_message(message);
            pb.inc(1);

            if self.config.save_interval > 0 && epoch % self.config.save_interval == 0 {
                self.save_checkpoint(&format!("epoch_{}", epoch))?;
            }

            if stop {
                log::info!("Early stopping at epoch {}", epoch);
                break;
            }
        }

        self.save_checkpoint("final")?;

        pb.finish_with_message("Training completed!");
        log::info!("Checkpoints saved in: {}", self.config.save_dir);
        Ok(())
    }

    fn train_epoch(&mut self, dataset: &SrDataset) -> EpochMetrics {
        let dataloader: SrDataLoader<B> = SrDataLoader::new(
            dataset.clone(),
            self.config.batch_size,
            true,
            self.device.clone(),
        );

        let mut metrics = EpochMetrics::default();

        for (batch_idx, batch) in dataloader.enumerate() {
            let Some(step) = self.train_step(batch) else {
                continue;
            };
            metrics.record(&step);

            if (batch_idx + 1) % 10 == 0 {
                log::debug!(
                    "Batch {}: critic={:.4} generator={:?}",
                    batch_idx + 1,
                    step.critic,
                    step.generator.map(|g| g.total)
                );
            }
        }

        metrics.mean()
    }

    /// L1 and PSNR of the current generator over a dataset, without autodiff.
    pub fn validate(&self, dataset: &SrDataset) -> Validation {
        let dataloader: SrDataLoader<B::InnerBackend> = SrDataLoader::new(
            dataset.clone(),
            self.config.batch_size,
            false,
            <B::InnerBackend as Backend>::Device::default(),
        );
        let generator = self.generator.valid();

        let mut l1 = 0.0;
        let mut psnr_sum = 0.0;
        let mut count = 0;

        for batch in dataloader {
            let fake = generator.forward(batch.low_res);
            let batch_l1: f32 = content_loss(fake.clone(), batch.high_res.clone())
                .into_scalar()
                .elem();
            let batch_psnr = psnr(fake.clamp(0.0, 1.0), batch.high_res, 1.0);

            if !batch_l1.is_finite() {
                log::warn!("Non-finite validation loss, skipping batch");
                continue;
            }

            l1 += batch_l1;
            psnr_sum += batch_psnr.min(100.0);
            count += 1;
        }

        if count == 0 {
            log::warn!("No valid validation batches");
            return Validation {
                l1: f32::INFINITY,
                psnr: 0.0,
            };
        }

        Validation {
            l1: l1 / count as f32,
            psnr: psnr_sum / count as f32,
        }
    }

    /// Write `<save_dir>/<name>/{generator,critic}.bin` and `config.json`.
    pub fn save_checkpoint(&self, name: &str) -> Result<()> {
        let checkpoint_dir = Path::new(&self.config.save_dir).join(name);
        std::fs::create_dir_all(&checkpoint_dir)?;

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.generator
            .clone()
            .save_file(checkpoint_dir.join("generator"), &recorder)
            .map_err(|e| anyhow!("Failed to save generator: {:?}", e))?;
        self.critic
            .clone()
            .save_file(checkpoint_dir.join("critic"), &recorder)
            .map_err(|e| anyhow!("Failed to save critic: {:?}", e))?;

        let config_json = serde_json::json!({
            "model_type": "ESRGAN",
            "in_channels": self.config.in_channels,
            "num_channels": self.config.num_channels,
            "num_blocks": self.config.num_blocks,
            "growth_channels": self.config.growth_channels,
            "high_res": self.config.high_res,
            "checkpoint_name": name,
        });
        std::fs::write(
            checkpoint_dir.join("config.json"),
            serde_json::to_string_pretty(&config_json)?,
        )?;

        log::info!("Checkpoint '{}' saved to {}", name, checkpoint_dir.display());
        Ok(())
    }
}

/// Restore a generator written by [`Trainer::save_checkpoint`].
pub fn load_generator<B: Backend>(
    checkpoint_dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<Generator<B>> {
    let checkpoint_dir = checkpoint_dir.as_ref();
    let content = std::fs::read_to_string(checkpoint_dir.join("config.json"))?;
    let meta: serde_json::Value = serde_json::from_str(&content)?;

    let field = |key: &str| {
        meta[key]
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| anyhow!("config.json is missing '{}'", key))
    };

    let generator = crate::model::GeneratorConfig::new()
        .with_in_channels(field("in_channels")?)
        .with_num_channels(field("num_channels")?)
        .with_num_blocks(field("num_blocks")?)
        .with_growth_channels(field("growth_channels")?)
        .init::<B>(device);

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    generator
        .load_file(checkpoint_dir.join("generator"), &recorder, device)
        .map_err(|e| anyhow!("Failed to load generator: {:?}", e))
}
