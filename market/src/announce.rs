use async_trait::async_trait;

/// Speech collaborator. Receives the finished announcement text for every
/// fired alert; how it is voiced is up to the implementation.
#[async_trait]
pub trait AnnouncementSink: Send + Sync + 'static {
    async fn announce(&self, message: &str) -> anyhow::Result<()>;
}

/// Writes announcements to the log under the `announce` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

#[async_trait]
impl AnnouncementSink for LogAnnouncer {
    async fn announce(&self, message: &str) -> anyhow::Result<()> {
        tracing::info!(target: "announce", "{message}");
        Ok(())
    }
}
