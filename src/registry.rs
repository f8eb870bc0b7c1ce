use crate::context::ExecutionContext;
use std::sync::OnceLock;

static INSTALLED: OnceLock<ExecutionContext> = OnceLock::new();

/// Capture the calling thread as the process-wide execution context.
///
/// Call once during process start, from the thread that will run the ticks.
/// Later calls, from any thread, return the context captured by the first one.
pub fn install() -> ExecutionContext {
    let mut captured = false;
    let context = INSTALLED.get_or_init(|| {
        captured = true;
        ExecutionContext::capture()
    });
    if captured {
        log::debug!("execution context installed on {:?}", context.owner());
    }
    context.clone()
}

/// False before [`install`].
pub fn current_is_owning_thread() -> bool {
    INSTALLED
        .get()
        .is_some_and(ExecutionContext::is_owning_thread)
}

/// Queue handle of the installed context, used to post continuations onto it.
/// `None` before [`install`].
pub fn queue_handle() -> Option<ExecutionContext> {
    INSTALLED.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    // The registry is process-wide: keep every assertion on it in this single test.
    #[test]
    fn install_once() {
        crate::utils::init_test_logger();
        let (first, on_owner) = thread::spawn(|| (install(), current_is_owning_thread()))
            .join()
            .unwrap();
        assert!(on_owner);
        assert!(!current_is_owning_thread());

        let again = install();
        assert!(again.same_context(&first));
        assert_eq!(again.owner(), first.owner());
        assert!(queue_handle().is_some_and(|handle| handle.same_context(&first)));

        let owner = first.owner();
        let on_other = thread::spawn(current_is_owning_thread).join().unwrap();
        assert!(!on_other);
        assert_ne!(owner, thread::current().id());
    }
}
