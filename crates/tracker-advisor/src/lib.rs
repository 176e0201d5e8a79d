pub mod extract;
pub mod gateway;
pub mod gemini;
pub mod mock;

pub use gateway::AdvisorGateway;
pub use gemini::{AdvisorConfig, GeminiAdvisor};
pub use mock::MockAdvisor;
