pub mod dataloader;
pub mod dataset;
pub mod tensor;
pub mod transforms;

pub use dataloader::{SrBatch, SrDataLoader};
pub use dataset::{SrDataset, SrSample, UPSCALE};
pub use tensor::{images_to_tensor, tensor_to_image};
pub use transforms::{random_crop, DataAugmentation};
