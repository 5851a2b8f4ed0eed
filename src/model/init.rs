use burn::nn::Initializer;

/// Default multiplier applied on top of Kaiming initialization.
pub const DEFAULT_INIT_SCALE: f64 = 0.1;

/// Kaiming-normal (fan-in, ReLU gain) initialization scaled down by `scale`.
///
/// Small initial weights keep the deep residual stack close to the identity at
/// the start of training. Every conv and linear layer of the generator and the
/// critic is built with this initializer.
pub fn scaled_kaiming(scale: f64) -> Initializer {
    Initializer::KaimingNormal {
        gain: std::f64::consts::SQRT_2 * scale,
        fan_out_only: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::conv::Conv2dConfig;
    use burn::nn::LinearConfig;
    use burn::prelude::*;

    type TestBackend = NdArray;

    fn std_dev(values: &[f32]) -> f32 {
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt()
    }

    #[test]
    fn conv_weights_follow_scaled_kaiming_std() {
        let device = Default::default();
        let conv = Conv2dConfig::new([64, 64], [3, 3])
            .with_initializer(scaled_kaiming(DEFAULT_INIT_SCALE))
            .init::<TestBackend>(&device);

        let weights = conv.weight.val().into_data().to_vec::<f32>().unwrap();
        let fan_in = 64.0 * 3.0 * 3.0;
        let expected = (2.0f32).sqrt() * 0.1 / f32::sqrt(fan_in);

        let actual = std_dev(&weights);
        assert!(
            (actual - expected).abs() / expected < 0.05,
            "std {actual} vs expected {expected}"
        );
    }

    #[test]
    fn scale_multiplies_linear_weights() {
        let device = Default::default();
        let full = LinearConfig::new(256, 256)
            .with_initializer(scaled_kaiming(1.0))
            .init::<TestBackend>(&device);
        let scaled = LinearConfig::new(256, 256)
            .with_initializer(scaled_kaiming(0.1))
            .init::<TestBackend>(&device);

        let full = std_dev(&full.weight.val().into_data().to_vec::<f32>().unwrap());
        let scaled = std_dev(&scaled.weight.val().into_data().to_vec::<f32>().unwrap());

        let ratio = scaled / full;
        assert!((ratio - 0.1).abs() < 0.01, "ratio {ratio}");
    }
}
