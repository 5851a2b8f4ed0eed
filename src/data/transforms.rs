use image::DynamicImage;
use rand::Rng;

/// Random geometric augmentation applied to square training crops.
pub struct DataAugmentation {
    pub enable: bool,
}

impl DataAugmentation {
    pub fn new(enable: bool) -> Self {
        Self { enable }
    }

    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        if !self.enable {
            return img;
        }

        let mut rng = rand::thread_rng();
        let mut img = img;

        // Random horizontal flip (50% chance)
        if rng.gen_bool(0.5) {
            img = img.fliph();
        }

        // Random quarter turn (50% chance); crops are square so the size holds
        if rng.gen_bool(0.5) {
            img = img.rotate90();
        }

        img
    }
}

/// Crop a random `size x size` window, enlarging images that are too small.
pub fn random_crop(img: DynamicImage, size: u32) -> DynamicImage {
    let img = if img.width() < size || img.height() < size {
        let scale = size as f32 / img.width().min(img.height()) as f32;
        let width = ((img.width() as f32 * scale).ceil() as u32).max(size);
        let height = ((img.height() as f32 * scale).ceil() as u32).max(size);
        img.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let mut rng = rand::thread_rng();
    let x = rng.gen_range(0..=img.width() - size);
    let y = rng.gen_range(0..=img.height() - size);

    img.crop_imm(x, y, size, size)
}
