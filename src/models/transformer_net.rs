//! Feed-forward style transfer network
//!
//! The fixed target architecture every checkpoint is reconciled against:
//! three downsampling convolutions, a stack of residual blocks, and two
//! upsampling convolutions back to RGB. The network is inference-only by
//! construction; there is no dropout and no batch statistics.

use anyhow::Result;
use candle_core::{Device, Tensor};

use crate::checkpoint::{ParameterMapping, Signature};
use crate::models::layers::{ConvLayer, InstanceNorm2d, ResidualBlock, UpsampleConvLayer};

/// Architecture hyperparameters
#[derive(Debug, Clone)]
pub struct TransformerNetConfig {
    /// Input/output image channels
    pub image_channels: usize,
    /// Channels after the first convolution
    pub base_channels: usize,
    /// Number of residual blocks at the bottleneck
    pub residual_blocks: usize,
}

impl Default for TransformerNetConfig {
    fn default() -> Self {
        Self {
            image_channels: 3,
            base_channels: 32,
            residual_blocks: 5,
        }
    }
}

/// The style transfer network
///
/// Expects input tensors of shape `(1, 3, H, W)` scaled to 0-255 and
/// produces output of the same shape. Parameter names follow the
/// historical checkpoint contract (`conv1.conv2d.weight`, `in1.weight`,
/// `res1.conv1.conv2d.weight`, `deconv1.conv2d.weight`, ...).
#[derive(Debug)]
pub struct TransformerNet {
    device: Device,
    config: TransformerNetConfig,

    conv1: ConvLayer,
    in1: InstanceNorm2d,
    conv2: ConvLayer,
    in2: InstanceNorm2d,
    conv3: ConvLayer,
    in3: InstanceNorm2d,

    residuals: Vec<ResidualBlock>,

    deconv1: UpsampleConvLayer,
    in4: InstanceNorm2d,
    deconv2: UpsampleConvLayer,
    in5: InstanceNorm2d,
    deconv3: ConvLayer,
}

impl TransformerNet {
    /// Create a fresh instance with default-initialized parameters
    pub fn new(device: &Device) -> Result<Self> {
        Self::with_config(TransformerNetConfig::default(), device)
    }

    /// Create with custom architecture hyperparameters
    pub fn with_config(config: TransformerNetConfig, device: &Device) -> Result<Self> {
        let c = config.base_channels;
        let img = config.image_channels;

        let residuals = (0..config.residual_blocks)
            .map(|_| ResidualBlock::init(c * 4, device))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            device: device.clone(),
            conv1: ConvLayer::init(img, c, 9, 1, device)?,
            in1: InstanceNorm2d::init(c, device)?,
            conv2: ConvLayer::init(c, c * 2, 3, 2, device)?,
            in2: InstanceNorm2d::init(c * 2, device)?,
            conv3: ConvLayer::init(c * 2, c * 4, 3, 2, device)?,
            in3: InstanceNorm2d::init(c * 4, device)?,
            residuals,
            deconv1: UpsampleConvLayer::init(c * 4, c * 2, 3, 2, device)?,
            in4: InstanceNorm2d::init(c * 2, device)?,
            deconv2: UpsampleConvLayer::init(c * 2, c, 3, 2, device)?,
            in5: InstanceNorm2d::init(c, device)?,
            deconv3: ConvLayer::init(c, img, 9, 1, device)?,
            config,
        })
    }

    /// Export the current parameter mapping (name to tensor)
    pub fn parameters(&self) -> ParameterMapping {
        let mut out = ParameterMapping::new();
        self.conv1.collect_into("conv1", &mut out);
        self.in1.collect_into("in1", &mut out);
        self.conv2.collect_into("conv2", &mut out);
        self.in2.collect_into("in2", &mut out);
        self.conv3.collect_into("conv3", &mut out);
        self.in3.collect_into("in3", &mut out);
        for (i, block) in self.residuals.iter().enumerate() {
            block.collect_into(&format!("res{}", i + 1), &mut out);
        }
        self.deconv1.collect_into("deconv1", &mut out);
        self.in4.collect_into("in4", &mut out);
        self.deconv2.collect_into("deconv2", &mut out);
        self.in5.collect_into("in5", &mut out);
        self.deconv3.collect_into("deconv3", &mut out);
        out
    }

    /// Current parameter-name-to-shape mapping.
    ///
    /// This is the sole authority the reconciler filters against.
    pub fn signature(&self) -> Signature {
        self.parameters()
            .into_iter()
            .map(|(name, tensor)| (name, tensor.dims().to_vec()))
            .collect()
    }

    /// Overwrite matching parameters in place from a reconciled mapping.
    ///
    /// Entries whose names do not occur in this network are ignored, so
    /// this is safe to call with any reconciled mapping. Returns the
    /// number of parameters applied; unmatched parameters keep their
    /// default initialization.
    pub fn apply_parameters(&mut self, params: &ParameterMapping) -> Result<usize> {
        let mut applied = 0;
        applied += self.conv1.apply_into("conv1", params)?;
        applied += self.in1.apply_into("in1", params)?;
        applied += self.conv2.apply_into("conv2", params)?;
        applied += self.in2.apply_into("in2", params)?;
        applied += self.conv3.apply_into("conv3", params)?;
        applied += self.in3.apply_into("in3", params)?;
        for (i, block) in self.residuals.iter_mut().enumerate() {
            applied += block.apply_into(&format!("res{}", i + 1), params)?;
        }
        applied += self.deconv1.apply_into("deconv1", params)?;
        applied += self.in4.apply_into("in4", params)?;
        applied += self.deconv2.apply_into("deconv2", params)?;
        applied += self.in5.apply_into("in5", params)?;
        applied += self.deconv3.apply_into("deconv3", params)?;
        Ok(applied)
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Image tensor (1, channels, height, width), 0-255 scale
    ///
    /// # Returns
    /// * Stylized image tensor of the same shape
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let y = self.in1.forward(&self.conv1.forward(x)?)?.relu()?;
        let y = self.in2.forward(&self.conv2.forward(&y)?)?.relu()?;
        let mut y = self.in3.forward(&self.conv3.forward(&y)?)?.relu()?;

        for block in &self.residuals {
            y = block.forward(&y)?;
        }

        let y = self.in4.forward(&self.deconv1.forward(&y)?)?.relu()?;
        let y = self.in5.forward(&self.deconv2.forward(&y)?)?.relu()?;
        self.deconv3.forward(&y)
    }

    /// Device the network lives on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Architecture hyperparameters
    pub fn config(&self) -> &TransformerNetConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_signature_shapes() {
        let net = TransformerNet::new(&Device::Cpu).unwrap();
        let sig = net.signature();

        assert_eq!(sig["conv1.conv2d.weight"], vec![32, 3, 9, 9]);
        assert_eq!(sig["conv1.conv2d.bias"], vec![32]);
        assert_eq!(sig["in1.weight"], vec![32]);
        assert_eq!(sig["conv3.conv2d.weight"], vec![128, 64, 3, 3]);
        assert_eq!(sig["res1.conv1.conv2d.weight"], vec![128, 128, 3, 3]);
        assert_eq!(sig["res5.in2.bias"], vec![128]);
        assert_eq!(sig["deconv1.conv2d.weight"], vec![64, 128, 3, 3]);
        assert_eq!(sig["deconv3.conv2d.weight"], vec![3, 32, 9, 9]);
    }

    #[test]
    fn test_signature_matches_parameter_export() {
        let net = TransformerNet::new(&Device::Cpu).unwrap();
        let sig = net.signature();
        let params = net.parameters();

        assert_eq!(sig.len(), params.len());
        for (name, tensor) in &params {
            assert_eq!(sig[name], tensor.dims().to_vec());
        }
    }

    #[test]
    fn test_default_config() {
        let net = TransformerNet::new(&Device::Cpu).unwrap();
        assert_eq!(net.config().residual_blocks, 5);
        assert_eq!(net.config().base_channels, 32);
        assert!(matches!(net.device(), Device::Cpu));
    }

    #[test]
    fn test_forward_preserves_image_shape() {
        let device = Device::Cpu;
        let net = TransformerNet::new(&device).unwrap();
        let x = Tensor::zeros((1, 3, 32, 32), DType::F32, &device).unwrap();
        let y = net.forward(&x).unwrap();
        assert_eq!(y.dims4().unwrap(), (1, 3, 32, 32));
    }

    #[test]
    fn test_apply_parameters_counts_matches() {
        let device = Device::Cpu;
        let mut net = TransformerNet::new(&device).unwrap();

        // A full export applies everywhere; a single entry applies once.
        let full = net.parameters();
        let total = full.len();
        assert_eq!(net.apply_parameters(&full).unwrap(), total);

        let mut single = ParameterMapping::new();
        single.insert(
            "in1.weight".to_string(),
            Tensor::zeros(32, DType::F32, &device).unwrap(),
        );
        assert_eq!(net.apply_parameters(&single).unwrap(), 1);
    }

    #[test]
    fn test_apply_parameters_overwrites_values() {
        let device = Device::Cpu;
        let mut net = TransformerNet::new(&device).unwrap();

        let mut params = ParameterMapping::new();
        params.insert(
            "in1.bias".to_string(),
            Tensor::ones(32, DType::F32, &device).unwrap(),
        );
        net.apply_parameters(&params).unwrap();

        let exported = net.parameters();
        let bias = exported["in1.bias"].to_vec1::<f32>().unwrap();
        assert!(bias.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }
}
