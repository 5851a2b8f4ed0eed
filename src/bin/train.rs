use burn::backend::{Autodiff, NdArray};
use clap::Parser;
use esrgan::training::{Trainer, TrainingConfig};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train ESRGAN on a folder of high-resolution images")]
struct Args {
    /// Training config; a default one is written here if missing
    #[arg(short, long, default_value = "configs/train_config.yaml")]
    config: String,

    /// Override the training image directory
    #[arg(short, long)]
    data: Option<String>,

    /// Override the number of epochs
    #[arg(short, long)]
    epochs: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    println!("ESRGAN Training (CPU)");
    println!("=====================\n");

    type MyBackend = NdArray;
    type MyAutodiffBackend = Autodiff<MyBackend>;

    let device = Default::default();

    let mut config = if Path::new(&args.config).exists() {
        println!("Loading config from {}", args.config);
        TrainingConfig::from_yaml(&args.config)?
    } else {
        let config = TrainingConfig::default();
        if let Some(parent) = Path::new(&args.config).parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(&args.config)?;
        println!("Created default config at {}", args.config);
        config
    };

    if let Some(data) = args.data {
        config.data_dir = data;
    }
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    config.validate()?;

    println!("\nTraining Configuration:");
    println!("  Data dir: {}", config.data_dir);
    println!("  Val dir: {}", config.val_dir.as_deref().unwrap_or("-"));
    println!("  Epochs: {}", config.epochs);
    println!("  Batch size: {}", config.batch_size);
    println!("  Learning rate: {}", config.learning_rate);
    println!(
        "  Crops: {}x{} -> {}x{}",
        config.low_res(),
        config.low_res(),
        config.high_res,
        config.high_res
    );
    println!("  RRDBs: {}", config.num_blocks);
    println!("  Lambda GP: {}", config.lambda_gp);
    println!("  Save dir: {}", config.save_dir);
    println!();

    let mut trainer = Trainer::<MyAutodiffBackend>::new(config, device);

    match trainer.train() {
        Ok(()) => {
            println!("\nTraining completed successfully!");
            println!("Checkpoints saved in '{}'", trainer.config().save_dir);
            Ok(())
        }
        Err(e) => {
            eprintln!("\nTraining failed: {}", e);
            Err(e)
        }
    }
}
