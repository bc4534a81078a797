pub mod memory;

pub use memory::MemoryCoordinationStore;
