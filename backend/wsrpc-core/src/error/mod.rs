pub mod config;
pub mod envelope;
pub mod rpc;
pub mod transport;

pub use config::ConfigError;
pub use envelope::EnvelopeError;
pub use rpc::RpcError;
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    #[error(transparent)]
    Envelope(#[from] envelope::EnvelopeError),

    #[error(transparent)]
    Rpc(#[from] rpc::RpcError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
