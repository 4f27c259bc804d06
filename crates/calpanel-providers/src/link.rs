//! Network link abstraction.
//!
//! On the device this is the WiFi co-processor; on a desktop the OS owns the
//! link and [`NoopLink`] is used.

use tracing::debug;

use crate::error::ProviderResult;
use crate::provider::BoxFuture;

/// Something that can re-establish network connectivity.
pub trait NetworkLink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Tears down and brings the link back up.
    fn reconnect(&self) -> BoxFuture<'_, ProviderResult<()>>;
}

/// A link managed by the operating system. Reconnecting does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLink;

impl NetworkLink for NoopLink {
    fn name(&self) -> &str {
        "os"
    }

    fn reconnect(&self) -> BoxFuture<'_, ProviderResult<()>> {
        debug!("link is managed by the OS, nothing to reconnect");
        Box::pin(async { Ok(()) })
    }
}
