use burn::prelude::*;
use image::RgbImage;

/// Stack RGB images of equal size into a [B, 3, H, W] tensor with values in [0, 1].
pub fn images_to_tensor<B: Backend>(images: &[RgbImage], device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = images.first().map(|img| img.dimensions()).unwrap_or((0, 0));
    let (width, height) = (width as usize, height as usize);

    let mut values = Vec::with_capacity(images.len() * 3 * height * width);
    for img in images {
        // HWC -> CHW
        for c in 0..3 {
            values.extend(img.pixels().map(|pixel| pixel[c] as f32 / 255.0));
        }
    }

    Tensor::from_data(
        TensorData::new(values, [images.len(), 3, height, width]),
        device,
    )
}

/// Convert a [3, H, W] tensor back to an image, clamping values to [0, 1].
pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> RgbImage {
    let [_, height, width] = tensor.dims();
    let plane = height * width;

    let values: Vec<f32> = tensor
        .clamp(0.0, 1.0)
        .into_data()
        .iter::<f32>()
        .collect();

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let idx = y as usize * width + x as usize;
        image::Rgb([
            to_byte(values[idx]),
            to_byte(values[plane + idx]),
            to_byte(values[2 * plane + idx]),
        ])
    })
}

fn to_byte(value: f32) -> u8 {
    (value * 255.0).round() as u8
}
