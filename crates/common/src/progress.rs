//! Generic progress callback trait and implementations.

use std::marker::PhantomData;

/// Generic progress callback trait.
///
/// Type parameter `T` is the progress data type, so select queries and
/// listings can report different information through the same pattern.
pub trait ProgressCallback<T>: Send + Sync {
    /// Called with progress updates.
    ///
    /// # Arguments
    /// * `progress` - Progress data for the current operation
    fn on_progress(&self, progress: &T);
}

/// A no-op progress callback.
pub struct NoOpProgress;

impl<T> ProgressCallback<T> for NoOpProgress {
    fn on_progress(&self, _progress: &T) {}
}

/// A progress callback that wraps a closure.
pub struct FnProgress<F, T> {
    callback: F,
    _marker: PhantomData<fn(&T)>,
}

impl<F, T> FnProgress<F, T>
where
    F: Fn(&T) + Send + Sync,
{
    /// Create a new closure-based progress callback.
    ///
    /// # Arguments
    /// * `callback` - Closure that receives progress updates
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _marker: PhantomData,
        }
    }
}

impl<F, T> ProgressCallback<T> for FnProgress<F, T>
where
    F: Fn(&T) + Send + Sync,
{
    fn on_progress(&self, progress: &T) {
        (self.callback)(progress)
    }
}

/// Create a progress callback from a closure.
///
/// # Arguments
/// * `f` - Closure that receives progress updates
pub fn progress_fn<F, T>(f: F) -> FnProgress<F, T>
where
    F: Fn(&T) + Send + Sync,
{
    FnProgress::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct ScanProgress {
        bytes_scanned: u64,
    }

    #[test]
    fn test_noop_progress() {
        let progress: NoOpProgress = NoOpProgress;
        progress.on_progress(&ScanProgress { bytes_scanned: 42 });
    }

    #[test]
    fn test_fn_progress_accumulates() {
        let total: Arc<AtomicU64> = Arc::new(AtomicU64::new(0));
        let total_clone: Arc<AtomicU64> = total.clone();

        let callback = progress_fn(move |p: &ScanProgress| {
            total_clone.fetch_add(p.bytes_scanned, Ordering::SeqCst);
        });

        callback.on_progress(&ScanProgress { bytes_scanned: 10 });
        callback.on_progress(&ScanProgress { bytes_scanned: 32 });

        assert_eq!(total.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_fn_progress_is_object_safe() {
        let callback: Box<dyn ProgressCallback<ScanProgress>> =
            Box::new(progress_fn(|_: &ScanProgress| {}));
        callback.on_progress(&ScanProgress { bytes_scanned: 1 });
    }
}
