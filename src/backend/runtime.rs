use std::future::Future;

use crate::error::AnyloadError;

/// Run an async object-store call from synchronous code.
///
/// Builds a current-thread runtime for the call. When a Tokio runtime is
/// already active on this thread, the private runtime runs on a scoped helper
/// thread, since blocking the ambient one would panic or, on a current-thread
/// runtime, starve its IO and timer drivers.
pub fn run_blocking<F, Fut, T>(make_future: F) -> Result<T, AnyloadError>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, AnyloadError>>,
    T: Send,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        std::thread::scope(|s| {
            s.spawn(|| block_on_private(make_future))
                .join()
                .map_err(|_| {
                    AnyloadError::Io(std::io::Error::other("object storage worker panicked"))
                })?
        })
    } else {
        block_on_private(make_future)
    }
}

fn block_on_private<F, Fut, T>(make_future: F) -> Result<T, AnyloadError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AnyloadError>>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(make_future())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_without_ambient_runtime() {
        let value = run_blocking(|| async { Ok::<_, AnyloadError>(41 + 1) }).expect("run");
        assert_eq!(value, 42);
    }

    #[test]
    fn runs_inside_ambient_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let value = rt.block_on(async {
            run_blocking(|| async { Ok::<_, AnyloadError>("inner") }).expect("run")
        });
        assert_eq!(value, "inner");
    }

    #[test]
    fn timers_make_progress_inside_current_thread_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let value = rt.block_on(async {
            run_blocking(|| async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok::<_, AnyloadError>(7)
            })
            .expect("run")
        });
        assert_eq!(value, 7);
    }

    #[test]
    fn errors_propagate() {
        let err = run_blocking(|| async {
            Err::<(), _>(AnyloadError::Transport {
                uri: "s3://b/k".to_string(),
                message: "boom".to_string(),
            })
        })
        .expect_err("error");
        assert!(err.to_string().contains("boom"));
    }
}
