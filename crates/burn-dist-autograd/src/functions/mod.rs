mod recv;
mod send;

pub use recv::*;
pub use send::*;
