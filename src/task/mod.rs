mod continuation;
mod handle;

pub use self::{
    continuation::then,
    handle::{make_failed, make_ready, slot, Handle, Slot},
};
pub use crate::runtime::spawn;

pub(crate) use self::handle::forward;
