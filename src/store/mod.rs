pub mod memory;
pub mod session_cache;
pub mod traits;

pub use memory::MemoryStore;
pub use session_cache::CopySessionCache;
pub use traits::NodeStore;
