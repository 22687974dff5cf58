pub mod catalog;
pub mod common;
pub mod node;

pub use catalog::*;
pub use common::*;
pub use node::*;
