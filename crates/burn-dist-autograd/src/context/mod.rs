mod base;
mod container;
mod guard;

pub use base::*;
pub use container::*;
pub use guard::*;
