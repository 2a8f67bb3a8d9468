mod clock;
mod device_id;
mod device_record;
mod device_state_store;
mod result;

pub use clock::*;
pub use device_id::*;
pub use device_record::*;
pub use device_state_store::*;
pub use result::*;
