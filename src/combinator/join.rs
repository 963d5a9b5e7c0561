use crate::{
    error::TaskError,
    task::{self, Handle, Slot},
};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Inputs accepted by [`when_all`].
pub trait WhenAll {
    type Output: Send + 'static;

    fn when_all(self) -> Handle<Self::Output>;
}

/// Resolves once every handle has completed, with the results in input order.
///
/// Tuples of up to twelve handles resolve to the tuple of their values and a
/// `Vec<Handle<T>>` resolves to a `Vec<T>`. Position `i` of the output always
/// holds input `i`'s result, whatever order they finish in. If any input
/// fails, the combined handle fails with the first failure observed, once all
/// inputs have settled.
pub fn when_all<H: WhenAll>(handles: H) -> Handle<H::Output> {
    handles.when_all()
}

impl WhenAll for () {
    type Output = ();

    fn when_all(self) -> Handle<()> {
        task::make_ready(())
    }
}

// Each arity peels its head off: the tail is joined first, then a
// continuation on the head waits for both and prepends the head's value.
macro_rules! impl_when_all {
    ($T:ident $h:ident) => {
        impl<$T: Send + 'static> WhenAll for (Handle<$T>,) {
            type Output = ($T,);

            fn when_all(self) -> Handle<Self::Output> {
                let ($h,) = self;
                let tail = ().when_all();

                task::then($h, move |head| {
                    let head = head.get();
                    let () = task::forward(tail.get());
                    (task::forward(head),)
                })
            }
        }
    };
    ($T:ident $h:ident, $($R:ident $r:ident),+) => {
        impl<$T: Send + 'static, $($R: Send + 'static),+> WhenAll for (Handle<$T>, $(Handle<$R>),+) {
            type Output = ($T, $($R),+);

            fn when_all(self) -> Handle<Self::Output> {
                let ($h, $($r),+) = self;
                let tail = ($($r,)+).when_all();

                task::then($h, move |head| {
                    let head = head.get();
                    let tail = tail.get();
                    let head = task::forward(head);
                    let ($($r,)+) = task::forward(tail);
                    (head, $($r),+)
                })
            }
        }

        impl_when_all!($($R $r),+);
    };
}

impl_when_all!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l);

/// Ordered result placeholders for the `Vec` join.
///
/// Position `i` is only written by the continuation attached to input `i`;
/// the continuation that brings `remaining` to zero commits.
struct Accumulator<T> {
    values: Box<[Mutex<Option<T>>]>,
    remaining: AtomicUsize,
    failure: Mutex<Option<TaskError>>,
    slot: Mutex<Option<Slot<Vec<T>>>>,
}

impl<T> Accumulator<T> {
    fn new(len: usize, slot: Slot<Vec<T>>) -> Arc<Self> {
        Arc::new(Self {
            values: (0..len).map(|_| Mutex::new(None)).collect(),
            remaining: AtomicUsize::new(len),
            failure: Mutex::new(None),
            slot: Mutex::new(Some(slot)),
        })
    }

    fn fill(&self, index: usize, result: Result<T, TaskError>) {
        match result {
            Ok(value) => {
                let previous = self.values[index].lock().replace(value);
                assert!(previous.is_none(), "join position {} filled twice", index);
            }
            Err(error) => {
                self.failure.lock().get_or_insert(error);
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.commit();
        }
    }

    fn commit(&self) {
        let slot = match self.slot.lock().take() {
            Some(slot) => slot,
            None => unreachable!("join committed more than once"),
        };

        if let Some(error) = self.failure.lock().take() {
            tracing::trace!(%error, "join failed");
            return slot.fail(error);
        }

        let values = self
            .values
            .iter()
            .map(|value| value.lock().take())
            .collect::<Option<Vec<T>>>();

        match values {
            Some(values) => {
                tracing::trace!(len = values.len(), "join committed");
                slot.set(values)
            }
            None => unreachable!("join committed with an unfilled position"),
        }
    }
}

impl<T: Send + 'static> WhenAll for Vec<Handle<T>> {
    type Output = Vec<T>;

    fn when_all(self) -> Handle<Vec<T>> {
        if self.is_empty() {
            return task::make_ready(Vec::new());
        }

        let (slot, handle) = task::slot();
        let accumulator = Accumulator::new(self.len(), slot);

        for (index, input) in self.into_iter().enumerate() {
            let accumulator = Arc::clone(&accumulator);
            // detached: the accumulator settles the combined handle
            let _ = task::then(input, move |input| accumulator.fill(index, input.get()));
        }

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_joins_are_ready() {
        assert!(when_all(()).is_ready());
        assert_eq!(when_all(Vec::<Handle<u8>>::new()).get(), Ok(vec![]));
    }

    #[test]
    fn single_tuple() {
        assert_eq!(when_all((task::make_ready(5),)).join(), (5,));
    }

    #[test]
    fn heterogeneous_tuple() {
        let joined = when_all((
            task::make_ready(1u8),
            task::make_ready("two"),
            task::make_ready(3.0f64),
            task::make_ready(String::from("four")),
        ));
        assert_eq!(joined.join(), (1u8, "two", 3.0f64, String::from("four")));
    }

    #[test]
    fn accumulator_commits_in_input_order() {
        let (slot, handle) = task::slot();
        let accumulator = Accumulator::new(3, slot);

        accumulator.fill(2, Ok('c'));
        accumulator.fill(0, Ok('a'));
        assert!(!handle.is_ready());
        accumulator.fill(1, Ok('b'));

        assert_eq!(handle.get(), Ok(vec!['a', 'b', 'c']));
    }

    #[test]
    fn accumulator_keeps_first_failure() {
        let (slot, handle) = task::slot::<Vec<u8>>();
        let accumulator = Accumulator::new(3, slot);

        accumulator.fill(1, Err(TaskError::Broken));
        accumulator.fill(0, Err(TaskError::Panicked("later".into())));
        assert!(!handle.is_ready());
        accumulator.fill(2, Ok(3));

        assert_eq!(handle.get(), Err(TaskError::Broken));
    }

    #[test]
    fn tuple_failure_waits_for_tail() {
        let (slot, tail) = task::slot::<u8>();
        let joined = when_all((task::make_failed::<u8>(TaskError::Broken), tail));

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!joined.is_ready());

        slot.set(1);
        assert_eq!(joined.get(), Err(TaskError::Broken));
    }
}
