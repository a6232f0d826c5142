mod accumulate;
mod node;

pub use accumulate::*;
pub use node::*;
