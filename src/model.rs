// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! OpenPose BODY_25 model loading and inference.
//!
//! This module provides [`OpenPoseModel`], an ONNX Runtime session around an
//! exported BODY_25 network together with the preprocessing and PAF decoding
//! that turn a frame into [`Detection`]s.

use std::path::Path;

use image::DynamicImage;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use crate::config::PoseConfig;
use crate::detection::Detection;
use crate::error::{PipelineError, Result};
use crate::postprocessing::{PoseMaps, decode};
use crate::preprocessing::preprocess_frame;

/// OpenPose BODY_25 estimator backed by ONNX Runtime.
///
/// # Example
///
/// ```no_run
/// use openpose_tracker::{OpenPoseModel, PoseConfig};
///
/// let mut model = OpenPoseModel::load("weights/openpose_body25.onnx", PoseConfig::default())?;
/// let frame = image::open("frame.jpg")?;
/// let people = model.detect_image(&frame)?;
/// println!("Found {} people", people.len());
/// # Ok::<(), openpose_tracker::PipelineError>(())
/// ```
pub struct OpenPoseModel {
    /// ONNX Runtime session.
    session: Session,
    /// Input tensor name.
    input_name: String,
    /// Output tensor names.
    output_names: Vec<String>,
    /// Estimator configuration.
    config: PoseConfig,
}

impl OpenPoseModel {
    /// Load an exported BODY_25 network.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ONNX weights.
    /// * `config` - Estimator configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigError`] for an invalid configuration and
    /// [`PipelineError::ModelLoadError`] if the file is missing or ONNX Runtime rejects it.
    pub fn load<P: AsRef<Path>>(path: P, config: PoseConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();

        if !path.exists() {
            return Err(PipelineError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| PipelineError::ModelLoadError(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::ModelLoadError(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(config.num_threads)
            .map_err(|e| PipelineError::ModelLoadError(format!("Failed to set intra-thread count: {e}")))?
            .commit_from_file(path)
            .map_err(|e| PipelineError::ModelLoadError(format!("Failed to load model: {e}")))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| PipelineError::ModelLoadError("Model has no inputs".to_string()))?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.len() < 2 {
            return Err(PipelineError::ModelLoadError(format!(
                "Expected heatmap and PAF outputs, found {}",
                output_names.len()
            )));
        }

        Ok(Self {
            session,
            input_name,
            output_names,
            config,
        })
    }

    /// Detect people in a frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageError`] if the frame cannot be preprocessed and
    /// [`PipelineError::InferenceError`] if the session fails or its outputs are malformed.
    ///
    /// With several [`PoseConfig::scales`] the network runs once per scale;
    /// the maps are resized back to the input resolution and averaged before
    /// decoding.
    pub fn detect_image(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let prep = preprocess_frame(image, &self.config)?;
        let res = self.config.input_res;

        let mut per_scale = Vec::with_capacity(self.config.scales.len());
        for i in 0..self.config.scales.len() {
            let side = self.config.scaled_res(self.config.scales[i]);
            let input = prep.tensor_at(side, self.config.layout)?;
            let outputs = self.run_inference(&input)?;
            per_scale.push(PoseMaps::from_outputs(&outputs, res)?);
        }

        let maps = PoseMaps::average(per_scale)?;
        Ok(decode(maps, &prep.transform, &self.config))
    }

    /// Run the session and collect every output as `(data, shape)`.
    fn run_inference(&mut self, input: &ndarray::Array4<f32>) -> Result<Vec<(Vec<f32>, Vec<usize>)>> {
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous)
            .map_err(|e| PipelineError::InferenceError(format!("Failed to create input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| PipelineError::InferenceError(format!("Inference failed: {e}")))?;

        self.output_names
            .iter()
            .map(|name| {
                let output = outputs
                    .get(name.as_str())
                    .ok_or_else(|| PipelineError::InferenceError(format!("Output '{name}' not found")))?;
                let (shape, data) = output
                    .try_extract_tensor::<f32>()
                    .map_err(|e| PipelineError::InferenceError(format!("Failed to extract output: {e}")))?;
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
                Ok((data.to_vec(), shape))
            })
            .collect()
    }

    /// Estimator configuration.
    #[must_use]
    pub const fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// Name of the input tensor.
    #[must_use]
    pub fn input_name(&self) -> &str {
        &self.input_name
    }
}

impl std::fmt::Debug for OpenPoseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenPoseModel")
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .field("input_res", &self.config.input_res)
            .finish_non_exhaustive()
    }
}
