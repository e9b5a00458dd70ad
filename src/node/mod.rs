pub mod config;
pub mod node;
pub mod shell;
pub mod service_handle;
pub mod cli;

pub use config::NodeConfig;
pub use node::VoterNode;
pub use service_handle::ServiceHandle;
pub use cli::run_cli;
