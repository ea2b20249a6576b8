//! Error type shared by the setup paths of the crate.
//!
//! Per-frame code never returns these: it logs and leaves state as it was.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TeleopError {
    /// A named transform could not be found in the rig.
    #[error("transform `{0}` not found in rig")]
    MissingTarget(String),

    /// A body implementation does not expose the requested capability.
    #[error("body does not support `{0}`")]
    UnsupportedProperty(&'static str),

    /// Parallel message arrays that disagree in length.
    #[error("message arrays disagree in length ({names} names, {positions} positions)")]
    MalformedMessage { names: usize, positions: usize },

    /// Shortest-arc rotation between two vectors that is undefined.
    #[error("rotation for joint `{0}` is undefined")]
    NumericDegeneracy(String),

    #[error("transform `{node}` is already owned by `{owner}`")]
    OwnershipConflict { node: String, owner: String },

    #[error("a joint chain needs at least two transforms, got {0}")]
    ChainTooShort(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TeleopError>;
