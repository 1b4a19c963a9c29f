//! Built-in integration drivers. Each owns its wire protocol.

pub mod docker;
pub mod home_assistant;
pub mod portainer;

pub use docker::DockerDriver;
pub use home_assistant::HomeAssistantDriver;
pub use portainer::PortainerDriver;
