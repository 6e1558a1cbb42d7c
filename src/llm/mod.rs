// Text-generation collaborator: trait seam, token exchange, chat gateway

pub mod gateway;
pub mod provider;
pub mod token;

pub use gateway::GatewayClient;
pub use provider::TextGenerator;
pub use token::TokenExchanger;
