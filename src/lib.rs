//! Blocking task handles with continuation, race and join combinators.
//!
//! ```
//! use strand::{spawn, then, when_all, when_any};
//!
//! let doubled = then(spawn(|| 21), |handle| handle.join() * 2);
//! assert_eq!(doubled.join(), 42);
//!
//! let both = when_all((spawn(|| 1), spawn(|| "two")));
//! assert_eq!(both.join(), (1, "two"));
//!
//! let first = when_any(vec![spawn(|| 3), spawn(|| 4)]).join();
//! let value = first.into_winner().join();
//! assert!(value == 3 || value == 4);
//! ```

#![forbid(unsafe_code)]

mod combinator;
mod error;
pub mod runtime;
pub mod task;

pub use self::{
    combinator::{when_all, when_any, WhenAll, WhenAny, Winner},
    error::TaskError,
    runtime::{block_on, Runtime},
    task::{make_failed, make_ready, spawn, then, Handle, Slot},
};
