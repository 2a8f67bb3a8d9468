pub mod domain;
pub mod ingestion_worker;
pub mod source;

pub use domain::*;
pub use ingestion_worker::*;
pub use source::*;
