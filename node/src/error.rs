use relay_types::PeerId;
use thiserror::Error;

/// Node-level error taxonomy.
///
/// `Config` is fatal at startup. `Transport` is transient and drives the
/// gossip/re-plan machinery. `Decode` is permanent: the sink reports it and
/// moves on. `NoPath` is not user-visible — the source queues on it.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("transport to peer {peer}: {source}")]
    Transport {
        peer: PeerId,
        #[source]
        source: reqwest::Error,
    },

    #[error("no path to destination {0}")]
    NoPath(PeerId),

    #[error("envelope codec: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
