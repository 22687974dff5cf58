pub mod copy_ops;
pub mod error;
pub mod rewire;
pub mod use_case;

pub use copy_ops::{CopyOperations, CopyOptions};
pub use error::{CopyError, MoveError};
pub use use_case::UseCase;
