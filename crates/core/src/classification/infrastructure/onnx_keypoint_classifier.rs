/// Keypoint emotion classifier using ONNX Runtime via `ort`.
use std::path::Path;

use crate::classification::domain::keypoint_classifier::KeypointClassifier;
use crate::geometry::domain::feature_vector::NormalizedFeatureVector;

/// Small dense classifier over the flattened normalized landmark vector.
///
/// Input is `[1, N]` float32; output 0 is `[1, num_classes]` scores and the
/// class id is the index of the highest score.
pub struct OnnxKeypointClassifier {
    session: ort::session::Session,
    /// Static input width, when the model declares one.
    input_len: Option<usize>,
}

impl OnnxKeypointClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_len = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() == 2 && shape[1] > 0 {
                    Some(shape[1] as usize)
                } else {
                    None
                }
            } else {
                None
            }
        });
        log::info!(
            "Loaded keypoint classifier {} (input width {})",
            model_path.display(),
            input_len.map_or_else(|| "dynamic".to_string(), |n| n.to_string())
        );

        Ok(Self { session, input_len })
    }
}

impl KeypointClassifier for OnnxKeypointClassifier {
    fn classify(
        &mut self,
        features: &NormalizedFeatureVector,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        if let Some(expected) = self.input_len {
            if features.len() != expected {
                return Err(format!(
                    "Feature vector has {} values but the classifier expects {expected}",
                    features.len()
                )
                .into());
            }
        }

        let input = ndarray::Array2::from_shape_vec((1, features.len()), features.values().to_vec())?;
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Classifier model produced no outputs".into());
        }

        let scores = outputs[0].try_extract_array::<f32>()?;
        let scores: Vec<f32> = scores.iter().copied().collect();
        argmax(&scores).ok_or_else(|| "Classifier produced an empty score vector".into())
    }
}

/// Index of the largest score; the first one wins on ties, NaN never wins.
fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}
