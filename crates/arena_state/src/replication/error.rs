//! Replication errors.

use crate::net::PeerId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// Non-authority попытался записать authoritative значение.
    /// Вызывающий должен переслать intent через RequestChannel.
    #[error("{caller} is not the authority of this field (authority: {authority})")]
    PermissionDenied { caller: PeerId, authority: PeerId },

    /// Update старее (или равен) уже применённому — FIFO per field нарушен бы
    #[error("stale update: sequence {received} is not newer than {current}")]
    StaleUpdate { received: u16, current: u16 },

    #[error("failed to encode replication frame: {0}")]
    Encode(String),

    #[error("failed to decode replication frame: {0}")]
    Decode(String),
}
