use crate::task::{self, Handle, Slot};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU8, AtomicUsize, Ordering},
    Arc,
};

const CONSTRUCTING: u8 = 0;
const ARMED: u8 = 1;
const COMMITTED: u8 = 2;

const NO_WINNER: usize = usize::MAX;

/// The atomic bookkeeping of one race.
///
/// Two events must both happen before the combined result is committed: every
/// finisher has been attached (`arm`) and some branch has completed (`fire`).
/// Whichever of the two observes the other does the commit, through the single
/// `ARMED -> COMMITTED` transition, so exactly one caller ever commits.
#[derive(Debug)]
pub(crate) struct RaceState {
    state: AtomicU8,
    winner: AtomicUsize,
    fired: AtomicUsize,
}

impl RaceState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CONSTRUCTING),
            winner: AtomicUsize::new(NO_WINNER),
            fired: AtomicUsize::new(0),
        }
    }

    /// Records that branch `index` completed. Returns true if the caller must
    /// commit.
    pub fn fire(&self, index: usize) -> bool {
        assert_ne!(index, NO_WINNER);
        self.fired.fetch_add(1, Ordering::SeqCst);

        if self
            .winner
            .compare_exchange(NO_WINNER, index, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.try_commit()
    }

    /// Records that every finisher is attached. Returns true if the caller
    /// must commit.
    pub fn arm(&self) -> bool {
        let armed = self
            .state
            .compare_exchange(CONSTRUCTING, ARMED, Ordering::SeqCst, Ordering::SeqCst);
        assert!(armed.is_ok(), "race armed twice");

        self.winner().is_some() && self.try_commit()
    }

    fn try_commit(&self) -> bool {
        self.state
            .compare_exchange(ARMED, COMMITTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn winner(&self) -> Option<usize> {
        match self.winner.load(Ordering::SeqCst) {
            NO_WINNER => None,
            index => Some(index),
        }
    }

    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn is_committed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == COMMITTED
    }
}

/// What a [`when_any`] handle resolves to: every input handle plus the
/// position of the one that completed first.
///
/// The winning handle is always [`Handle::is_ready`]. Losing branches keep
/// running and stay retrievable.
#[derive(Debug)]
pub struct Winner<H> {
    index: usize,
    handles: H,
}

impl<H> Winner<H> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn handles(&self) -> &H {
        &self.handles
    }

    pub fn into_handles(self) -> H {
        self.handles
    }

    pub fn into_parts(self) -> (usize, H) {
        (self.index, self.handles)
    }
}

impl<T> Winner<Vec<Handle<T>>> {
    /// Takes the winning handle, dropping the losers.
    pub fn into_winner(mut self) -> Handle<T> {
        self.handles.swap_remove(self.index)
    }
}

struct Race<H> {
    state: RaceState,
    handles: Mutex<Option<H>>,
    slot: Mutex<Option<Slot<Winner<H>>>>,
}

impl<H: Send + 'static> Race<H> {
    fn new(slot: Slot<Winner<H>>) -> Arc<Self> {
        Arc::new(Self {
            state: RaceState::new(),
            handles: Mutex::new(None),
            slot: Mutex::new(Some(slot)),
        })
    }

    /// Installs the finisher of branch `index`. It runs on whichever thread
    /// settles the branch, so a race never waits for a free pool worker.
    fn attach<T>(self: &Arc<Self>, index: usize, handle: Handle<T>) -> Handle<T> {
        let race = Arc::clone(self);
        handle.on_settle(move || {
            if race.state.fire(index) {
                race.commit();
            }
        });
        handle
    }

    fn arm(&self, handles: H) {
        *self.handles.lock() = Some(handles);
        if self.state.arm() {
            self.commit();
        }
    }

    fn commit(&self) {
        debug_assert!(self.state.is_committed());
        let slot = self.slot.lock().take();
        let handles = self.handles.lock().take();
        let index = self.state.winner();

        match (slot, handles, index) {
            (Some(slot), Some(handles), Some(index)) => {
                tracing::trace!(index, fired = self.state.fired(), "race committed");
                slot.set(Winner { index, handles });
            }
            _ => unreachable!("race committed more than once"),
        }
    }
}

/// Inputs accepted by [`when_any`].
pub trait WhenAny {
    type Handles: Send + 'static;

    fn when_any(self) -> Handle<Winner<Self::Handles>>;
}

/// Resolves once the first of `handles` completes.
///
/// The result holds all of the input handles, still individually
/// retrievable, plus the index of the first to complete. Resolution never
/// happens before every finisher is attached, even if an input was already
/// settled when `when_any` was called.
///
/// Accepts tuples of up to twelve handles or a non-empty `Vec<Handle<T>>`.
///
/// # Panics
///
/// Panics if given an empty `Vec`.
pub fn when_any<H: WhenAny>(handles: H) -> Handle<Winner<H::Handles>> {
    handles.when_any()
}

impl<T: Send + 'static> WhenAny for Vec<Handle<T>> {
    type Handles = Vec<Handle<T>>;

    fn when_any(self) -> Handle<Winner<Self::Handles>> {
        assert!(!self.is_empty(), "when_any requires at least one handle");

        let (slot, handle) = task::slot();
        let race = Race::new(slot);
        let handles = self
            .into_iter()
            .enumerate()
            .map(|(index, handle)| race.attach(index, handle))
            .collect();

        race.arm(handles);
        handle
    }
}

macro_rules! impl_when_any {
    ($($T:ident $h:ident $index:tt),+) => {
        impl<$($T: Send + 'static),+> WhenAny for ($(Handle<$T>,)+) {
            type Handles = ($(Handle<$T>,)+);

            fn when_any(self) -> Handle<Winner<Self::Handles>> {
                let (slot, handle) = task::slot();
                let race = Race::new(slot);
                let ($($h,)+) = self;

                race.arm(($(race.attach($index, $h),)+));
                handle
            }
        }
    };
}

impl_when_any!(A a 0);
impl_when_any!(A a 0, B b 1);
impl_when_any!(A a 0, B b 1, C c 2);
impl_when_any!(A a 0, B b 1, C c 2, D d 3);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4, F f 5);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6, H h 7);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6, H h 7, I i 8);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6, H h 7, I i 8, J j 9);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6, H h 7, I i 8, J j 9, K k 10);
impl_when_any!(A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6, H h 7, I i 8, J j 9, K k 10, L l 11);
