use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::Distribution;
use clap::Parser;

use esrgan::{DiscriminatorConfig, GeneratorConfig};

type BackendType = NdArray;

/// Build the generator and critic and push a random batch through both.
#[derive(Parser, Debug)]
#[command(author, version, about = "ESRGAN shape check")]
struct Args {
    /// Images in the random batch
    #[arg(short, long, default_value_t = 5)]
    batch: usize,

    /// Low-resolution side (96x96 -> 24x24)
    #[arg(short, long, default_value_t = 24)]
    low_res: usize,

    /// RRDBs in the generator trunk
    #[arg(long, default_value_t = 23)]
    blocks: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let device = <BackendType as Backend>::Device::default();

    println!("ESRGAN shape check (CPU)");
    println!("========================\n");

    let generator = GeneratorConfig::new()
        .with_num_blocks(args.blocks)
        .init::<BackendType>(&device);
    let critic = DiscriminatorConfig::new().init::<BackendType>(&device);
    log::info!(
        "Generator: {} parameters, critic: {} parameters",
        generator.num_params(),
        critic.num_params()
    );

    let x = Tensor::<BackendType, 4>::random(
        [args.batch, 3, args.low_res, args.low_res],
        Distribution::Normal(0.0, 1.0),
        &device,
    );

    let gen_out = generator.forward(x);
    let disc_out = critic.forward(gen_out.clone());

    println!("Generator output: {:?}", gen_out.dims());
    println!("Critic output:    {:?}", disc_out.dims());

    Ok(())
}
