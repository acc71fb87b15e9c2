use ethers::types::Address;

/// Every failure the quoting engine can report.
///
/// All variants are local to a single quote: the caller drops the pool from the candidate set
/// for that request and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("input outside function domain")]
    DomainError,
    #[error("tick out of range")]
    TickOutOfRange,
    #[error("invalid swap")]
    InvalidSwap,
    #[error("insufficient output")]
    InsufficientOutput,
    #[error("requested output exceeds balance")]
    RequestedOutputExceedsBalance,
    #[error("oracle cardinality cannot be zero")]
    OracleCardinalityZero,
    #[error("oracle target predates oldest observation")]
    OracleTargetTooOld,
    #[error("deposit exceeds vault max")]
    DepositExceedsMax,
    #[error("withdraw exceeds vault max")]
    WithdrawExceedsMax,
    #[error("liquidity density function not initialized")]
    LdfNotInitialized,
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unknown address {0:?}")]
    UnknownAddress(Address),
}

impl SwapError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SwapError::Overflow => "overflow",
            SwapError::DomainError => "domain",
            SwapError::TickOutOfRange => "tick_out_of_range",
            SwapError::InvalidSwap => "invalid_swap",
            SwapError::InsufficientOutput => "insufficient_output",
            SwapError::RequestedOutputExceedsBalance => "output_exceeds_balance",
            SwapError::OracleCardinalityZero => "oracle_cardinality_zero",
            SwapError::OracleTargetTooOld => "oracle_target_too_old",
            SwapError::DepositExceedsMax => "deposit_exceeds_max",
            SwapError::WithdrawExceedsMax => "withdraw_exceeds_max",
            SwapError::LdfNotInitialized => "ldf_not_initialized",
            SwapError::InvalidParams(_) => "invalid_params",
            SwapError::Decode(_) => "decode",
            SwapError::UnknownAddress(_) => "unknown_address",
        }
    }
}

impl From<serde_json::Error> for SwapError {
    fn from(e: serde_json::Error) -> Self {
        SwapError::Decode(e.to_string())
    }
}

impl From<hex::FromHexError> for SwapError {
    fn from(e: hex::FromHexError) -> Self {
        SwapError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;
