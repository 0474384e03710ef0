pub mod mock_gateway;
pub mod prepare_env;

pub use mock_gateway::MockGateway;
