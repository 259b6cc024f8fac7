#![cfg(feature = "backend-tract")]

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::decode::decode_rows;
use crate::detect::result::RawDetection;
use crate::frame::Frame;
use crate::model::{ChannelOrder, ModelSpec, NetworkConfig};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based backend for ONNX YOLO-style detectors.
///
/// Loads the weights once at construction; a load failure is fatal to the
/// caller. Inference errors are returned per frame.
pub struct TractBackend {
    model: Plan,
    network: NetworkConfig,
}

impl TractBackend {
    /// Load the ONNX model named by `spec` and prepare it for inference.
    pub fn new(spec: &ModelSpec) -> Result<Self> {
        let size = spec.network.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(&spec.weights)
            .with_context(|| {
                format!("failed to load ONNX model from {}", spec.weights.display())
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            network: spec.network.clone(),
        })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        build_input(&self.network, frame)
    }
}

/// Resize to the square network input and normalise into an NCHW tensor.
fn build_input(network: &NetworkConfig, frame: &Frame) -> Tensor {
    let size = network.input_size;
    let resized = imageops::resize(frame.image(), size, size, FilterType::Triangle);
    let size = size as usize;
    let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
        let source_channel = match network.channel_order {
            ChannelOrder::Rgb => channel,
            ChannelOrder::Bgr => 2 - channel,
        };
        let pixel = resized.get_pixel(x as u32, y as u32).0[source_channel] as f32;
        (pixel - network.mean[channel]) * network.scale
    });
    input.into_tensor()
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        let mut detections = Vec::new();
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .context("model output tensor was not f32")?;
            let row_len = *view
                .shape()
                .last()
                .ok_or_else(|| anyhow!("model output tensor has no dimensions"))?;
            let flat: Vec<f32> = view.iter().copied().collect();
            detections.extend(decode_rows(&flat, row_len)?);
        }
        Ok(detections)
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.network.input_size;
        let blank = Frame::new(0, image::RgbImage::new(size, size));
        self.detect(&blank).map(|_| ())
    }
}
