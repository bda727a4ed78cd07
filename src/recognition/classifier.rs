//! EMNIST letter classifier over ONNX Runtime.
//!
//! The second, independent recognizer. Weights are pretrained and
//! consumed as-is; the session is built lazily once per process behind a
//! mutex-guarded cell and shared across pages.
//!
//! The preprocessing transform must reproduce the training-time pipeline
//! bit for bit: resize to 28x28 grayscale, scale to [0, 1], then
//! **transpose and invert** to match raw EMNIST orientation and polarity.
//! A deviation here does not raise an error; it just silently costs
//! accuracy, which is why the transform is pinned by tests.

use crate::core::constants::{CLASSIFIER_INPUT_SIZE, CLASSIFIER_NUM_CLASSES};
use crate::core::{ReadError, ReadResult};
use image::RgbImage;
use image::imageops::FilterType;
use ndarray::Array4;
use once_cell::sync::OnceCell;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

static SHARED_SESSION: OnceCell<ClassifierEngine> = OnceCell::new();

/// Argmax class and probability for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierReading {
    /// Predicted character ('A'..='Z').
    pub character: char,
    /// Softmax probability of the predicted class, in [0, 1].
    pub confidence: f32,
}

/// The shared ONNX session plus its resolved tensor names.
pub struct ClassifierEngine {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl ClassifierEngine {
    /// Returns the process-wide classifier, loading the model on first
    /// use. Missing or corrupt weights are an engine-level failure.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Recognition`]; the caller treats this as
    /// page-fatal.
    pub fn shared(model_path: &Path) -> ReadResult<&'static ClassifierEngine> {
        SHARED_SESSION.get_or_try_init(|| Self::load(model_path))
    }

    fn load(model_path: &Path) -> ReadResult<ClassifierEngine> {
        if !model_path.exists() {
            return Err(ReadError::recognition(format!(
                "classifier weights not found at '{}'",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .and_then(|mut builder| builder.commit_from_file(model_path))
            .map_err(|e| {
                ReadError::recognition_with(
                    format!("failed to load classifier model '{}'", model_path.display()),
                    e,
                )
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_owned())
            .ok_or_else(|| ReadError::recognition("classifier model declares no inputs"))?;
        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_owned())
            .ok_or_else(|| ReadError::recognition("classifier model declares no outputs"))?;

        debug!(
            model = %model_path.display(),
            input = %input_name,
            output = %output_name,
            "classifier session ready"
        );

        Ok(ClassifierEngine {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Classifies one region crop.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Recognition`] on any session-level failure.
    pub fn classify(&self, region: &RgbImage) -> ReadResult<ClassifierReading> {
        let input = preprocess_for_classifier(region);

        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| ReadError::recognition_with("failed to build classifier input", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ReadError::recognition("classifier session mutex poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| ReadError::recognition_with("classifier inference failed", e))?;

        let (_, logits) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ReadError::recognition_with("failed to extract classifier output", e))?;

        if logits.len() < CLASSIFIER_NUM_CLASSES {
            return Err(ReadError::recognition(format!(
                "classifier produced {} scores, expected {}",
                logits.len(),
                CLASSIFIER_NUM_CLASSES
            )));
        }

        let probabilities = softmax(&logits[..CLASSIFIER_NUM_CLASSES]);
        let (index, confidence) = argmax(&probabilities);

        Ok(ClassifierReading {
            character: index_to_char(index),
            confidence,
        })
    }
}

/// Builds the NHWC `[1, 28, 28, 1]` input tensor, applying the pinned
/// training-time transform (transpose + polarity inversion).
pub fn preprocess_for_classifier(region: &RgbImage) -> Array4<f32> {
    let size = CLASSIFIER_INPUT_SIZE;
    let gray = image::imageops::grayscale(region);
    let resized = image::imageops::resize(&gray, size, size, FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, size as usize, size as usize, 1));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let normalized = pixel.0[0] as f32 / 255.0;
        // Transpose (swap x/y) and invert: white-on-black, EMNIST raw
        // orientation. Exactly what the model saw in training.
        input[[0, x as usize, y as usize, 0]] = 1.0 - normalized;
    }
    input
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(probabilities: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::NEG_INFINITY);
    for (index, &value) in probabilities.iter().enumerate() {
        if value > best.1 {
            best = (index, value);
        }
    }
    best
}

/// Maps a class index onto its letter; out-of-range indices become '?'.
fn index_to_char(index: usize) -> char {
    if index < CLASSIFIER_NUM_CLASSES {
        (b'A' + index as u8) as char
    } else {
        '?'
    }
}
