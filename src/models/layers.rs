//! Building blocks for the style network
//!
//! Each layer owns its tensors directly so parameters can be introspected
//! and overwritten by name after checkpoint reconciliation. Qualified
//! parameter names follow the historical checkpoint contract
//! (`conv1.conv2d.weight`, `in1.weight`, ...).

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Module};

use crate::checkpoint::ParameterMapping;

/// Convolution with same-style padding, wrapping `candle_nn::Conv2d`
///
/// The inner conv is addressed as `<prefix>.conv2d` in parameter names.
#[derive(Debug)]
pub struct ConvLayer {
    conv: Conv2d,
    stride: usize,
    padding: usize,
}

impl ConvLayer {
    /// Create with default random initialization
    pub fn init(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        device: &Device,
    ) -> Result<Self> {
        let fan_in = in_channels * kernel_size * kernel_size;
        let bound = (1.0 / fan_in as f64).sqrt() as f32;
        let weight = Tensor::rand(
            -bound,
            bound,
            (out_channels, in_channels, kernel_size, kernel_size),
            device,
        )?;
        let bias = Tensor::rand(-bound, bound, out_channels, device)?;

        let padding = kernel_size / 2;
        Ok(Self {
            conv: Conv2d::new(weight, Some(bias), conv_config(padding, stride)),
            stride,
            padding,
        })
    }

    /// Collect qualified parameter names and tensors
    pub fn collect_into(&self, prefix: &str, out: &mut ParameterMapping) {
        out.insert(
            format!("{prefix}.conv2d.weight"),
            self.conv.weight().clone(),
        );
        if let Some(bias) = self.conv.bias() {
            out.insert(format!("{prefix}.conv2d.bias"), bias.clone());
        }
    }

    /// Overwrite matching parameters in place; returns the applied count
    pub fn apply_into(&mut self, prefix: &str, params: &ParameterMapping) -> Result<usize> {
        let weight = params.get(&format!("{prefix}.conv2d.weight"));
        let bias = params.get(&format!("{prefix}.conv2d.bias"));
        let applied = weight.is_some() as usize + bias.is_some() as usize;
        self.rebuild(weight, bias)?;
        Ok(applied)
    }

    fn rebuild(&mut self, weight: Option<&Tensor>, bias: Option<&Tensor>) -> Result<()> {
        let device = self.conv.weight().device().clone();
        let weight = match weight {
            Some(t) => t.to_device(&device)?,
            None => self.conv.weight().clone(),
        };
        let bias = match (bias, self.conv.bias()) {
            (Some(t), _) => Some(t.to_device(&device)?),
            (None, current) => current.cloned(),
        };
        self.conv = Conv2d::new(weight, bias, conv_config(self.padding, self.stride));
        Ok(())
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.conv.forward(x).map_err(Into::into)
    }
}

/// Instance normalization with affine parameters
///
/// Normalizes each channel over its spatial extent. Carries no running
/// statistics; checkpoints that include them lose those buffers during
/// reconciliation.
#[derive(Debug)]
pub struct InstanceNorm2d {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl InstanceNorm2d {
    /// Create with identity affine parameters
    pub fn init(channels: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            weight: Tensor::ones(channels, DType::F32, device)?,
            bias: Tensor::zeros(channels, DType::F32, device)?,
            eps: 1e-5,
        })
    }

    /// Collect qualified parameter names and tensors
    pub fn collect_into(&self, prefix: &str, out: &mut ParameterMapping) {
        out.insert(format!("{prefix}.weight"), self.weight.clone());
        out.insert(format!("{prefix}.bias"), self.bias.clone());
    }

    /// Overwrite matching parameters in place; returns the applied count
    pub fn apply_into(&mut self, prefix: &str, params: &ParameterMapping) -> Result<usize> {
        let mut applied = 0;
        if let Some(t) = params.get(&format!("{prefix}.weight")) {
            self.weight = t.to_device(self.weight.device())?;
            applied += 1;
        }
        if let Some(t) = params.get(&format!("{prefix}.bias")) {
            self.bias = t.to_device(self.bias.device())?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Forward pass over (batch, channels, height, width)
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_, channels, _, _) = x.dims4()?;
        let mean = x.mean_keepdim(3)?.mean_keepdim(2)?;
        let centered = x.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(3)?.mean_keepdim(2)?;
        let normalized = centered.broadcast_div(&var.affine(1.0, self.eps)?.sqrt()?)?;

        let weight = self.weight.reshape((1, channels, 1, 1))?;
        let bias = self.bias.reshape((1, channels, 1, 1))?;
        normalized
            .broadcast_mul(&weight)?
            .broadcast_add(&bias)
            .map_err(Into::into)
    }
}

/// Residual block: two conv + instance-norm pairs with a skip connection
#[derive(Debug)]
pub struct ResidualBlock {
    conv1: ConvLayer,
    in1: InstanceNorm2d,
    conv2: ConvLayer,
    in2: InstanceNorm2d,
}

impl ResidualBlock {
    /// Create with default random initialization
    pub fn init(channels: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            conv1: ConvLayer::init(channels, channels, 3, 1, device)?,
            in1: InstanceNorm2d::init(channels, device)?,
            conv2: ConvLayer::init(channels, channels, 3, 1, device)?,
            in2: InstanceNorm2d::init(channels, device)?,
        })
    }

    /// Collect qualified parameter names and tensors
    pub fn collect_into(&self, prefix: &str, out: &mut ParameterMapping) {
        self.conv1.collect_into(&format!("{prefix}.conv1"), out);
        self.in1.collect_into(&format!("{prefix}.in1"), out);
        self.conv2.collect_into(&format!("{prefix}.conv2"), out);
        self.in2.collect_into(&format!("{prefix}.in2"), out);
    }

    /// Overwrite matching parameters in place; returns the applied count
    pub fn apply_into(&mut self, prefix: &str, params: &ParameterMapping) -> Result<usize> {
        let mut applied = 0;
        applied += self.conv1.apply_into(&format!("{prefix}.conv1"), params)?;
        applied += self.in1.apply_into(&format!("{prefix}.in1"), params)?;
        applied += self.conv2.apply_into(&format!("{prefix}.conv2"), params)?;
        applied += self.in2.apply_into(&format!("{prefix}.in2"), params)?;
        Ok(applied)
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let out = self.in1.forward(&self.conv1.forward(x)?)?.relu()?;
        let out = self.in2.forward(&self.conv2.forward(&out)?)?;
        (out + x).map_err(Into::into)
    }
}

/// Nearest-neighbor upsampling followed by a stride-1 convolution
#[derive(Debug)]
pub struct UpsampleConvLayer {
    conv: ConvLayer,
    upsample: usize,
}

impl UpsampleConvLayer {
    /// Create with default random initialization
    pub fn init(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        upsample: usize,
        device: &Device,
    ) -> Result<Self> {
        Ok(Self {
            conv: ConvLayer::init(in_channels, out_channels, kernel_size, 1, device)?,
            upsample,
        })
    }

    /// Collect qualified parameter names and tensors
    pub fn collect_into(&self, prefix: &str, out: &mut ParameterMapping) {
        self.conv.collect_into(prefix, out);
    }

    /// Overwrite matching parameters in place; returns the applied count
    pub fn apply_into(&mut self, prefix: &str, params: &ParameterMapping) -> Result<usize> {
        self.conv.apply_into(prefix, params)
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = if self.upsample > 1 {
            let (_, _, h, w) = x.dims4()?;
            x.upsample_nearest2d(h * self.upsample, w * self.upsample)?
        } else {
            x.clone()
        };
        self.conv.forward(&x)
    }
}

fn conv_config(padding: usize, stride: usize) -> Conv2dConfig {
    Conv2dConfig {
        padding,
        stride,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_layer_shapes() {
        let device = Device::Cpu;
        let conv = ConvLayer::init(3, 8, 3, 2, &device).unwrap();
        let x = Tensor::zeros((1, 3, 16, 16), DType::F32, &device).unwrap();
        let y = conv.forward(&x).unwrap();
        assert_eq!(y.dims4().unwrap(), (1, 8, 8, 8));
    }

    #[test]
    fn test_conv_layer_parameter_names() {
        let device = Device::Cpu;
        let conv = ConvLayer::init(3, 8, 9, 1, &device).unwrap();
        let mut params = ParameterMapping::new();
        conv.collect_into("conv1", &mut params);

        assert_eq!(params["conv1.conv2d.weight"].dims(), &[8, 3, 9, 9]);
        assert_eq!(params["conv1.conv2d.bias"].dims(), &[8]);
    }

    #[test]
    fn test_conv_layer_apply_overwrites() {
        let device = Device::Cpu;
        let mut conv = ConvLayer::init(2, 2, 1, 1, &device).unwrap();
        let mut params = ParameterMapping::new();
        params.insert(
            "c.conv2d.weight".to_string(),
            Tensor::ones((2, 2, 1, 1), DType::F32, &device).unwrap(),
        );

        let applied = conv.apply_into("c", &params).unwrap();
        assert_eq!(applied, 1);

        let mut exported = ParameterMapping::new();
        conv.collect_into("c", &mut exported);
        let weight = exported["c.conv2d.weight"]
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(weight.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_instance_norm_normalizes() {
        let device = Device::Cpu;
        let norm = InstanceNorm2d::init(1, &device).unwrap();
        // Constant offset and scale should be normalized away.
        let data: Vec<f32> = (0..16).map(|i| 5.0 + 3.0 * i as f32).collect();
        let x = Tensor::from_vec(data, (1, 1, 4, 4), &device).unwrap();

        let y = norm.forward(&x).unwrap();
        let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let mean: f32 = values.iter().sum::<f32>() / values.len() as f32;
        assert!(mean.abs() < 1e-4);
    }

    #[test]
    fn test_residual_block_preserves_shape() {
        let device = Device::Cpu;
        let block = ResidualBlock::init(8, &device).unwrap();
        let x = Tensor::zeros((1, 8, 10, 10), DType::F32, &device).unwrap();
        let y = block.forward(&x).unwrap();
        assert_eq!(y.dims4().unwrap(), (1, 8, 10, 10));
    }

    #[test]
    fn test_upsample_conv_doubles_spatial_dims() {
        let device = Device::Cpu;
        let layer = UpsampleConvLayer::init(4, 2, 3, 2, &device).unwrap();
        let x = Tensor::zeros((1, 4, 8, 8), DType::F32, &device).unwrap();
        let y = layer.forward(&x).unwrap();
        assert_eq!(y.dims4().unwrap(), (1, 2, 16, 16));
    }
}
