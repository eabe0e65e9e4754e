#![allow(unstable_name_collisions)]
#![doc = include_str!("../README.md")]

mod error;
mod map;
mod raw;

#[cfg(feature = "serde")]
mod serde_impls;

pub use error::BuildError;
pub use map::{HashMap, HashMapBuilder, HashMapRef, Iter, Keys, Values};
pub use seize::{Collector, Guard, LocalGuard, OwnedGuard};
