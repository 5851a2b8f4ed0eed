use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use clap::Parser;
use std::path::PathBuf;

use esrgan::data::{images_to_tensor, tensor_to_image};
use esrgan::training::load_generator;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upscale an image 4x with a trained ESRGAN generator")]
struct Args {
    /// Path to input image
    #[arg(short, long)]
    image: PathBuf,

    /// Checkpoint directory (e.g., runs/train/best)
    #[arg(short, long, default_value = "runs/train/best")]
    weights: PathBuf,

    /// Output image path; defaults to <input>_x4.png
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    type MyBackend = NdArray;
    let device = NdArrayDevice::default();

    println!("ESRGAN Upscale (CPU)");
    println!("Image: {}", args.image.display());
    println!("Weights: {}", args.weights.display());

    let generator = load_generator::<MyBackend>(&args.weights, &device)?;
    if generator.in_channels() != 3 {
        anyhow::bail!(
            "checkpoint expects {} input channels, only RGB images are supported",
            generator.in_channels()
        );
    }

    let input = image::open(&args.image)?.to_rgb8();
    let (width, height) = input.dimensions();
    println!("Input size: {}x{}", width, height);

    let x = images_to_tensor::<MyBackend>(&[input], &device);
    let y = generator.forward(x);
    let [_, channels, out_h, out_w] = y.dims();
    let output = tensor_to_image(y.reshape([channels, out_h, out_w]));

    let output_path = args.output.unwrap_or_else(|| {
        let stem = args
            .image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        args.image.with_file_name(format!("{}_x4.png", stem))
    });

    output.save(&output_path)?;
    println!("Output size: {}x{}", out_w, out_h);
    println!("Saved to {}", output_path.display());

    Ok(())
}
