pub mod fixtures;
pub mod memory;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use memory::{MemoryMetadataStore, MemoryObjectStore, MemoryQueue};
