use thiserror::Error;

/// Failures talking to an Ethereum node
#[derive(Debug, Error)]
pub enum RpcError {
    /// The HTTP exchange itself failed
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with something that is not a JSON-RPC response
    #[error("decode error: {0}")]
    Decode(String),

    /// The node answered with a JSON-RPC `error` object
    #[error("{message}")]
    Node { code: i64, message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("method '{0}' not found")]
    UnknownFunction(String),

    #[error("argument count mismatch for '{name}': expected {expected}, got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index} of '{name}' must be {expected}")]
    ArgumentType {
        name: String,
        index: usize,
        expected: String,
    },
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signature(String),
}

/// Crowdsale contract failures
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("it's neither pre-ico, nor ico")]
    Stage,

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("unable to fetch gas price. aborting: {0}")]
    GasPrice(#[source] RpcError),

    #[error("unable to fetch nonce. aborting: {0}")]
    Nonce(#[source] RpcError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("contract value out of range: {0}")]
    Value(String),
}
