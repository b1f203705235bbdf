//! Progress observers and their registry.

use crate::ftp::progress::ProgressState;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Listener for transfer progress.
///
/// Called synchronously on the worker thread for every chunk; implementations
/// must return quickly and must not register or unregister observers from
/// inside a callback.
pub trait ProgressObserver: Send + Sync {
    fn on_upload_progress(&self, file_name: &str, current: u64, total: u64);
    fn on_download_progress(&self, file_name: &str, current: u64, total: u64);
}

/// Thread-safe set of non-owning observer references, deduplicated by
/// identity.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Weak<dyn ProgressObserver>>>,
}

#[derive(Clone, Copy)]
enum Channel {
    Upload,
    Download,
}

fn same_observer(weak: &Weak<dyn ProgressObserver>, ptr: *const ()) -> bool {
    weak.as_ptr() as *const () == ptr
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `observer` is already registered.
    pub fn register<O>(&self, observer: &Arc<O>) -> bool
    where
        O: ProgressObserver + 'static,
    {
        let shared: Arc<dyn ProgressObserver> = observer.clone();
        self.register_shared(&shared)
    }

    /// Same as [`register`](Self::register) for an already type-erased
    /// observer. Identity is the pointee, so a concrete `Arc` and its
    /// `dyn` clone count as one observer.
    pub fn register_shared(&self, observer: &Arc<dyn ProgressObserver>) -> bool {
        let ptr = Arc::as_ptr(observer) as *const ();
        let mut list = self.lock();
        list.retain(|w| w.strong_count() > 0);
        if list.iter().any(|w| same_observer(w, ptr)) {
            return false;
        }
        list.push(Arc::downgrade(observer));
        true
    }

    /// Returns `false` if `observer` was not registered.
    pub fn unregister<O>(&self, observer: &Arc<O>) -> bool
    where
        O: ProgressObserver + 'static,
    {
        let shared: Arc<dyn ProgressObserver> = observer.clone();
        self.unregister_shared(&shared)
    }

    pub fn unregister_shared(&self, observer: &Arc<dyn ProgressObserver>) -> bool {
        let ptr = Arc::as_ptr(observer) as *const ();
        let mut list = self.lock();
        match list.iter().position(|w| same_observer(w, ptr)) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().iter().all(|w| w.strong_count() == 0)
    }

    pub fn len(&self) -> usize {
        self.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Snapshot `progress` and deliver it to every upload callback.
    pub fn dispatch_upload(&self, progress: &ProgressState) {
        self.dispatch(progress, Channel::Upload);
    }

    /// Snapshot `progress` and deliver it to every download callback.
    pub fn dispatch_download(&self, progress: &ProgressState) {
        self.dispatch(progress, Channel::Download);
    }

    fn dispatch(&self, progress: &ProgressState, channel: Channel) {
        if self.is_empty() {
            return;
        }
        let snap = progress.snapshot();

        let mut list = self.lock();
        list.retain(|w| w.strong_count() > 0);
        for weak in list.iter() {
            let Some(observer) = weak.upgrade() else {
                continue;
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| match channel {
                Channel::Upload => observer.on_upload_progress(
                    &snap.file_name,
                    snap.current_bytes,
                    snap.total_bytes,
                ),
                Channel::Download => observer.on_download_progress(
                    &snap.file_name,
                    snap.current_bytes,
                    snap.total_bytes,
                ),
            }));
            if outcome.is_err() {
                log::debug!("Progress observer panicked; ignored");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Weak<dyn ProgressObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        uploads: AtomicUsize,
        downloads: AtomicUsize,
    }

    impl ProgressObserver for Counter {
        fn on_upload_progress(&self, _: &str, _: u64, _: u64) {
            self.uploads.fetch_add(1, Ordering::SeqCst);
        }
        fn on_download_progress(&self, _: &str, _: u64, _: u64) {
            self.downloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    impl ProgressObserver for Panicker {
        fn on_upload_progress(&self, _: &str, _: u64, _: u64) {
            panic!("observer failure");
        }
        fn on_download_progress(&self, _: &str, _: u64, _: u64) {
            panic!("observer failure");
        }
    }

    #[test]
    fn register_is_idempotent() {
        let reg = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        assert!(reg.register(&a));
        assert!(!reg.register(&a));
        assert_eq!(reg.len(), 1);
        assert!(reg.unregister(&a));
        assert!(!reg.unregister(&a));
        assert!(reg.is_empty());
    }

    #[test]
    fn type_erased_handle_is_the_same_observer() {
        let reg = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        let erased: Arc<dyn ProgressObserver> = a.clone();
        assert!(reg.register(&a));
        assert!(!reg.register_shared(&erased));
        assert_eq!(reg.len(), 1);

        reg.dispatch_upload(&ProgressState::new());
        assert_eq!(a.uploads.load(Ordering::SeqCst), 1);

        assert!(reg.unregister_shared(&erased));
        assert!(!reg.unregister(&a));
        assert!(reg.is_empty());
    }

    #[test]
    fn distinct_instances_are_distinct_observers() {
        let reg = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        assert!(reg.register(&a));
        assert!(reg.register(&b));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn dispatch_routes_by_channel() {
        let reg = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        reg.register(&a);
        let progress = ProgressState::new();
        reg.dispatch_upload(&progress);
        reg.dispatch_upload(&progress);
        reg.dispatch_download(&progress);
        assert_eq!(a.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(a.downloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_observer_does_not_starve_others() {
        let reg = ObserverRegistry::new();
        let bad = Arc::new(Panicker);
        let good = Arc::new(Counter::default());
        reg.register(&bad);
        reg.register(&good);
        let progress = ProgressState::new();
        for _ in 0..3 {
            reg.dispatch_upload(&progress);
        }
        assert_eq!(good.uploads.load(Ordering::SeqCst), 3);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn dropped_observer_is_pruned() {
        let reg = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        reg.register(&a);
        drop(a);
        assert!(reg.is_empty());
        reg.dispatch_download(&ProgressState::new());
        assert_eq!(reg.len(), 0);
    }
}
