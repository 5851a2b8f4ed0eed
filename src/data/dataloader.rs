use crate::data::dataset::SrDataset;
use crate::data::tensor::images_to_tensor;
use burn::prelude::*;
use rand::seq::SliceRandom;

pub struct SrDataLoader<B: Backend> {
    dataset: SrDataset,
    batch_size: usize,
    shuffle: bool,
    device: B::Device,
    indices: Vec<usize>,
    current_idx: usize,
}

impl<B: Backend> SrDataLoader<B> {
    pub fn new(dataset: SrDataset, batch_size: usize, shuffle: bool, device: B::Device) -> Self {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();

        if shuffle {
            let mut rng = rand::thread_rng();
            indices.shuffle(&mut rng);
        }

        Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle,
            device,
            indices,
            current_idx: 0,
        }
    }

    pub fn reset(&mut self) {
        self.current_idx = 0;
        if self.shuffle {
            let mut rng = rand::thread_rng();
            self.indices.shuffle(&mut rng);
        }
    }

    /// Number of batches per pass, counting a final partial batch.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

/// Matching low- and high-resolution images, both in [0, 1].
pub struct SrBatch<B: Backend> {
    /// [B, 3, h, w]
    pub low_res: Tensor<B, 4>,
    /// [B, 3, 4h, 4w]
    pub high_res: Tensor<B, 4>,
    pub batch_size: usize,
}

impl<B: Backend> Iterator for SrDataLoader<B> {
    type Item = SrBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_idx < self.indices.len() {
            let end_idx = (self.current_idx + self.batch_size).min(self.indices.len());
            let batch_indices = &self.indices[self.current_idx..end_idx];
            self.current_idx = end_idx;

            let mut low_res = Vec::with_capacity(batch_indices.len());
            let mut high_res = Vec::with_capacity(batch_indices.len());

            for &idx in batch_indices {
                match self.dataset.get(idx) {
                    Ok(sample) => {
                        low_res.push(sample.low_res);
                        high_res.push(sample.high_res);
                    }
                    Err(e) => log::warn!("Skipping sample {}: {}", idx, e),
                }
            }

            if low_res.is_empty() {
                continue;
            }

            return Some(SrBatch {
                batch_size: low_res.len(),
                low_res: images_to_tensor(&low_res, &self.device),
                high_res: images_to_tensor(&high_res, &self.device),
            });
        }

        None
    }
}
