use super::transforms::{random_crop, DataAugmentation};
use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::RgbImage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ratio between high- and low-resolution sides.
pub const UPSCALE: usize = 4;

/// One training pair: a high-resolution crop and its bicubic 4x downscale.
pub struct SrSample {
    pub low_res: RgbImage,
    pub high_res: RgbImage,
}

/// Folder of high-resolution images; low-resolution inputs are synthesised.
#[derive(Clone)]
pub struct SrDataset {
    images: Vec<PathBuf>,
    pub high_res: usize,
    pub augment: bool,
}

impl SrDataset {
    /// Collect every `png`/`jpg`/`jpeg` below `dir`.
    pub fn new(dir: impl AsRef<Path>, high_res: usize, augment: bool) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(anyhow!("Image directory not found: {}", dir.display()));
        }
        if high_res == 0 || high_res % UPSCALE != 0 {
            return Err(anyhow!(
                "High-resolution size {} is not a positive multiple of {}",
                high_res,
                UPSCALE
            ));
        }

        let mut images: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        images.sort();

        if images.is_empty() {
            return Err(anyhow!("No images found in {}", dir.display()));
        }

        log::info!("Loaded {} images from {}", images.len(), dir.display());

        Ok(Self {
            images,
            high_res,
            augment,
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn low_res(&self) -> usize {
        self.high_res / UPSCALE
    }

    pub fn get(&self, idx: usize) -> Result<SrSample> {
        let path = self.images.get(idx).ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds. Dataset has {} images",
                idx,
                self.images.len()
            )
        })?;

        let img = image::open(path)?;
        let crop = random_crop(img, self.high_res as u32);
        let crop = DataAugmentation::new(self.augment).apply(crop);

        let low = self.low_res() as u32;
        let low_res = crop.resize_exact(low, low, FilterType::CatmullRom).to_rgb8();

        Ok(SrSample {
            low_res,
            high_res: crop.to_rgb8(),
        })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}
