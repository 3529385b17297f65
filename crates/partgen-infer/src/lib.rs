pub mod backends;
pub mod inferrer;
pub mod prompt;
pub mod rate;
pub mod response;
pub mod views;

pub use backends::{CommandModel, ReplayModel};
pub use inferrer::{
    DimensionInferrer, InferenceConfig, InferenceError, InferenceRequest, Inferred, VisionModel,
};
pub use response::{parse_response, ResponseError};
pub use views::{ImageError, MediaType, ViewImage, ViewSet};
