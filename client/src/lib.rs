pub mod config;
pub mod controller;
pub mod driver;
pub mod gateway;
pub mod store;

pub use config::Config;
pub use controller::{AssistantController, ConversationState, Effect, Event, Phase};
pub use driver::Assistant;
pub use gateway::chat::{ChatGateway, HttpChatGateway, KeyCheck};
pub use gateway::prediction::HttpPredictionGateway;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
