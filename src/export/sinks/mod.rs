pub mod directory;
pub mod memory;

pub use directory::DirectorySink;
pub use memory::MemorySink;
