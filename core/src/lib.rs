pub mod context;
pub mod conversation;
pub mod credential;
pub mod error;
pub mod metrics;

pub use context::{PredictionContext, PredictionOutcome, RawPredictionResponse, UserInput};
pub use conversation::{ChatRole, Turn};
pub use error::{AssistantError, ChatGatewayError};
pub use metrics::ModelMetrics;
