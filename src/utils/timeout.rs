use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Default bound on establishing a TCP connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut`, mapping an elapsed deadline to [`Error::Timeout`].
pub async fn with_timeout<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}
