//! Hand skeleton processing: landmarks in, stabilized gesture labels out.

pub mod angle_buffer;
pub mod features;
pub mod geometry;
pub mod gesture;
pub mod landmarks;
pub mod motion;
pub mod stabilizer;

pub use features::FeatureExtractor;
pub use gesture::{GestureClassifier, HandRecord};
pub use landmarks::{HandObservation, TrackingKey};
