use crate::directive::Directive;
use crate::error::BoxError;

/// State of a coroutine after one step.
#[derive(Debug)]
pub enum CoroutineState<T> {
    /// Suspended until the directive is satisfied.
    Yielded(Directive),
    /// Finished with a value. The coroutine must not be resumed again.
    Complete(T),
}

/// Resumable computation driven by a [`Scheduler`](crate::Scheduler).
///
/// Each call to [`resume`](Coroutine::resume) runs until the next suspension point and yields exactly one
/// [`Directive`], or finishes. A step returning `Err` ends the coroutine: the error is handed to its
/// [`JoinHandle`](crate::JoinHandle).
pub trait Coroutine {
    type Output;
    fn resume(&mut self) -> Result<CoroutineState<Self::Output>, BoxError>;
}

/// Coroutine from a step closure.
///
/// ```
/// use tickbridge::{coroutine, CoroutineState, Directive, Scheduler};
/// let scheduler = Scheduler::new();
/// let mut countdown = 3;
/// let handle = scheduler.submit(coroutine::from_fn(move || {
///     countdown -= 1;
///     Ok(match countdown {
///         0 => CoroutineState::Complete("liftoff"),
///         _ => CoroutineState::Yielded(Directive::Tick),
///     })
/// }));
/// scheduler.tick();
/// scheduler.tick();
/// assert_eq!(handle.try_join().unwrap().unwrap(), "liftoff");
/// ```
pub fn from_fn<T, F>(step: F) -> FromFn<F>
where
    F: FnMut() -> Result<CoroutineState<T>, BoxError>,
{
    FromFn(step)
}

pub struct FromFn<F>(F);

impl<T, F> Coroutine for FromFn<F>
where
    F: FnMut() -> Result<CoroutineState<T>, BoxError>,
{
    type Output = T;
    fn resume(&mut self) -> Result<CoroutineState<T>, BoxError> {
        (self.0)()
    }
}

/// Coroutine yielding each directive of an iterator in turn, then completing.
///
/// The iterator is lazy: producing the next directive is the coroutine step.
pub fn from_iter<I>(directives: I) -> FromIter<I::IntoIter>
where
    I: IntoIterator<Item = Directive>,
{
    FromIter(directives.into_iter())
}

pub struct FromIter<I>(I);

impl<I: Iterator<Item = Directive>> Coroutine for FromIter<I> {
    type Output = ();
    fn resume(&mut self) -> Result<CoroutineState<()>, BoxError> {
        Ok(match self.0.next() {
            Some(directive) => CoroutineState::Yielded(directive),
            None => CoroutineState::Complete(()),
        })
    }
}

impl<C: Coroutine + ?Sized> Coroutine for Box<C> {
    type Output = C::Output;
    fn resume(&mut self) -> Result<CoroutineState<C::Output>, BoxError> {
        (**self).resume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_steps() {
        let mut coroutine = from_iter([Directive::Tick, Directive::Tick]);
        assert!(matches!(
            coroutine.resume().unwrap(),
            CoroutineState::Yielded(Directive::Tick)
        ));
        assert!(matches!(
            coroutine.resume().unwrap(),
            CoroutineState::Yielded(Directive::Tick)
        ));
        assert!(matches!(
            coroutine.resume().unwrap(),
            CoroutineState::Complete(())
        ));
    }

    #[test]
    fn boxed() {
        let mut coroutine: Box<dyn Coroutine<Output = u8>> =
            Box::new(from_fn(|| Ok(CoroutineState::Complete(7))));
        assert!(matches!(coroutine.resume().unwrap(), CoroutineState::Complete(7)));
    }
}
