mod in_memory_device_state_store;
mod json_file_device_state_store;

pub use in_memory_device_state_store::*;
pub use json_file_device_state_store::*;
