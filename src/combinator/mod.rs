mod join;
mod race;

pub use self::{
    join::{when_all, WhenAll},
    race::{when_any, WhenAny, Winner},
};
