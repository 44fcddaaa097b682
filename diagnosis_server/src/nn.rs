//! Image classification with an exported ONNX model.
//!
//! A model directory holds two assets: `model.onnx` with topology and weights, and
//! `metadata.json` with the class labels in output order.
use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use common::prediction::Prediction;
use image::{imageops, RgbImage};
use serde::Deserialize;
use tract_onnx::prelude::*;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub const MODEL_FILE: &str = "model.onnx";
pub const METADATA_FILE: &str = "metadata.json";

/// Tolerance when deciding whether the network output already is a distribution.
const PROBABILITY_SUM_TOLERANCE: f32 = 1.0e-3;

/// Turns a frame into an ordered list of predictions, one per class.
pub trait Classifier: Send + Sync {
    fn classify(&self, frame: &RgbImage) -> Result<Vec<Prediction>>;
}

/// Label metadata shipped next to the model.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    /// Side length of the square network input.
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    /// NCHW input instead of NHWC.
    #[serde(default)]
    pub channels_first: bool,
}

fn default_image_size() -> u32 {
    224
}

impl ModelMetadata {
    pub fn from_json(json: &str) -> Result<Self> {
        let metadata: ModelMetadata = serde_json::from_str(json)?;
        if metadata.labels.is_empty() {
            bail!("model metadata lists no labels");
        }
        if metadata.image_size == 0 {
            bail!("model metadata has an image size of zero");
        }

        Ok(metadata)
    }
}

pub struct OnnxClassifier {
    model: NnModel,
    metadata: ModelMetadata,
}

impl OnnxClassifier {
    /// Load `model.onnx` and `metadata.json` from `model_dir`.
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let metadata_path = model_dir.join(METADATA_FILE);
        let model_path = model_dir.join(MODEL_FILE);

        let metadata = fs::read_to_string(&metadata_path)
            .with_context(|| format!("failed to read {}", metadata_path.display()))?;
        let metadata = ModelMetadata::from_json(&metadata)
            .with_context(|| format!("invalid metadata in {}", metadata_path.display()))?;

        let model = get_classifier_model(&model_path, &metadata)
            .with_context(|| format!("failed to load {}", model_path.display()))?;

        log::info!(
            "Loaded model {} with {} classes: {:?}",
            model_path.display(),
            metadata.labels.len(),
            metadata.labels
        );

        Ok(Self { model, metadata })
    }

    pub fn labels(&self) -> &[String] {
        &self.metadata.labels
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, frame: &RgbImage) -> Result<Vec<Prediction>> {
        let input = preproc(frame, self.metadata.image_size, self.metadata.channels_first);
        let raw_nn_out = self.model.run(tvec!(input.into()))?;

        let scores: Vec<f32> = raw_nn_out
            .first()
            .context("model produced no output")?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();

        postproc(&self.metadata.labels, scores)
    }
}

fn get_classifier_model(path: &Path, metadata: &ModelMetadata) -> Result<NnModel> {
    let size = metadata.image_size as usize;
    let shape = match metadata.channels_first {
        true => tvec!(1, 3, size, size),
        false => tvec!(1, size, size, 3),
    };
    let input_fact = InferenceFact::dt_shape(f32::datum_type(), shape);

    let model = tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(0, input_fact)?
        .into_optimized()?
        .into_runnable()?;

    Ok(model)
}

/// Center-crop the frame to a square, resize it and scale pixels to `[-1, 1]`.
pub fn preproc(frame: &RgbImage, size: u32, channels_first: bool) -> Tensor {
    let (width, height) = frame.dimensions();
    let side = width.min(height);
    let cropped = imageops::crop_imm(frame, (width - side) / 2, (height - side) / 2, side, side)
        .to_image();
    let resized: RgbImage =
        imageops::resize(&cropped, size, size, imageops::FilterType::Triangle);

    let size = size as usize;
    let scale = |x: usize, y: usize, c: usize| resized[(x as _, y as _)][c] as f32 / 127.5 - 1.0;

    match channels_first {
        true => tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            scale(x, y, c)
        })
        .into(),
        false => tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            scale(x, y, c)
        })
        .into(),
    }
}

/// Pair raw scores with labels, applying softmax unless they already are probabilities.
pub fn postproc(labels: &[String], scores: Vec<f32>) -> Result<Vec<Prediction>> {
    if scores.len() != labels.len() {
        bail!(
            "model produced {} scores for {} labels",
            scores.len(),
            labels.len()
        );
    }

    let is_distribution = scores.iter().all(|p| (0.0..=1.0).contains(p))
        && (scores.iter().sum::<f32>() - 1.0).abs() < PROBABILITY_SUM_TOLERANCE;
    let probabilities = match is_distribution {
        true => scores,
        false => softmax(&scores),
    };

    Ok(labels
        .iter()
        .zip(probabilities)
        .map(|(label, probability)| Prediction::new(label.clone(), probability))
        .collect())
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
