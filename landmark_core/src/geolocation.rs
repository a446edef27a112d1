//! Best-effort current position
//!
//! Providers answer "where is the caller" with a position or `None`. A
//! missing permission, missing hardware or slow fix is `None`, never an
//! error. Callers bound the wait with [`position_within`].

use crate::landmark::Coordinates;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

/// Default budget for a position fix
pub const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self) -> Option<Coordinates>;
}

/// Always reports the same position, e.g. from configuration or flags
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl PositionProvider for FixedPosition {
    async fn current_position(&self) -> Option<Coordinates> {
        self.0.is_valid().then_some(self.0)
    }
}

/// No position source available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPosition;

#[async_trait]
impl PositionProvider for NoPosition {
    async fn current_position(&self) -> Option<Coordinates> {
        None
    }
}

/// Ask `provider` for a position, giving up after `timeout`
pub async fn position_within(provider: &dyn PositionProvider, timeout: Duration) -> Option<Coordinates> {
    match tokio::time::timeout(timeout, provider.current_position()).await {
        Ok(position) => position,
        Err(_) => {
            debug!("No position fix within {timeout:?}");
            None
        }
    }
}
