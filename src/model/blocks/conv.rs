use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Initializer, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;

/// Negative slope shared by every LeakyReLU in the generator and the critic.
pub const LEAKY_SLOPE: f64 = 0.2;

/// Elementwise derivative of `leaky_relu(x, LEAKY_SLOPE)`: 1 where `x >= 0`, the slope elsewhere.
///
/// The result is a constant mask with no autodiff history.
pub fn leaky_relu_derivative<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.greater_equal_elem(0.0).float() * (1.0 - LEAKY_SLOPE) + LEAKY_SLOPE
}

/// Biased convolution followed by an optional LeakyReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    use_act: bool,
    stride: usize,
    padding: usize,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        use_act: bool,
        initializer: Initializer,
    ) -> Self {
        let padding = kernel_size / 2;

        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_bias(true)
                .with_initializer(initializer)
                .init(device),
            use_act,
            stride,
            padding,
        }
    }

    pub fn in_channels(&self) -> usize {
        self.conv.weight.val().dims()[1]
    }

    /// 3x3, stride 1, "same" padding. The shape used by every layer inside the generator.
    pub fn same(
        device: &B::Device,
        in_channels: usize,
        out_channels: usize,
        use_act: bool,
        initializer: Initializer,
    ) -> Self {
        Self::new(device, in_channels, out_channels, 3, 1, use_act, initializer)
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        if self.use_act {
            activation::leaky_relu(x, LEAKY_SLOPE)
        } else {
            x
        }
    }

    /// Forward pass together with the derivative of the output along `tangent`.
    ///
    /// The tangent goes through the convolution weights only (no bias), scaled by
    /// the activation slopes of the primal pass.
    pub fn forward_with_tangent(
        &self,
        x: Tensor<B, 4>,
        tangent: Tensor<B, 4>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let x = self.conv.forward(x);
        let tangent = conv2d(
            tangent,
            self.conv.weight.val(),
            None,
            ConvOptions::new(
                [self.stride, self.stride],
                [self.padding, self.padding],
                [1, 1],
                1,
            ),
        );

        if !self.use_act {
            return (x, tangent);
        }
        let slopes = leaky_relu_derivative(x.clone());
        (activation::leaky_relu(x, LEAKY_SLOPE), tangent * slopes)
    }
}
