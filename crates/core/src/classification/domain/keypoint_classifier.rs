use crate::geometry::domain::feature_vector::NormalizedFeatureVector;

/// Domain interface for mapping a normalized landmark encoding to a class id.
///
/// The id indexes the label table loaded at startup. Implementations must be
/// stable: the same vector always yields the same id.
pub trait KeypointClassifier: Send {
    fn classify(
        &mut self,
        features: &NormalizedFeatureVector,
    ) -> Result<usize, Box<dyn std::error::Error>>;
}
