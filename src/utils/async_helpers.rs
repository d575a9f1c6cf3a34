// Async utility functions

use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{ConvertError, ConvertResult, ErrorCode, FhirConverterError, Result};

/// Fail fast with `Cancelled` when `cancel` has already fired.
pub fn check_cancelled(cancel: Option<&CancellationToken>) -> ConvertResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(ConvertError::Cancelled),
        _ => Ok(()),
    }
}

/// Run blocking `work` on the blocking pool, bounded by `bound` and
/// abandoned when `cancel` fires.
///
/// The work itself cannot be interrupted. On timeout or cancellation the
/// caller stops waiting and the task is left to finish on its own; its
/// result is discarded. Cancellation takes precedence over the timeout.
pub async fn run_bounded<T, F>(
    work: F,
    bound: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> ConvertResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    check_cancelled(cancel)?;

    let task = tokio::task::spawn_blocking(work);
    let bounded = async move {
        let joined = match bound {
            Some(duration) => match timeout(duration, task).await {
                Ok(joined) => joined,
                Err(elapsed) => {
                    tracing::warn!(?duration, "Template rendering timed out");
                    return Err(FhirConverterError::with_source(
                        ErrorCode::TimeoutError,
                        format!("Template rendering exceeded the time limit of {duration:?}"),
                        elapsed,
                    ));
                }
            },
            None => task.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) => Err(FhirConverterError::new(
                ErrorCode::TemplateRenderingError,
                format!("Template rendering task failed: {e}"),
            )),
        }
    };

    let outcome = match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ConvertError::Cancelled),
                outcome = bounded => outcome,
            }
        }
        None => bounded.await,
    };

    // A token that fired while the bound expired still reports cancellation
    check_cancelled(cancel)?;
    outcome.map_err(ConvertError::from)
}
