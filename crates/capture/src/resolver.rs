use async_trait::async_trait;

use crate::error::ResolutionError;
use crate::source::VariantMap;

/// Resolves a stream identifier into the currently available quality
/// variants and a playable URL per variant.
#[async_trait]
pub trait QualityResolver: Send + Sync {
    async fn resolve(&self, stream_id: &str) -> Result<VariantMap, ResolutionError>;
}
