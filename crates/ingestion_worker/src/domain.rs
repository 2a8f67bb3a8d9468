mod aggregation_engine;
mod decoded_fields;
mod inbound_envelope;
mod ingestion_pipeline;

pub use aggregation_engine::*;
pub use decoded_fields::*;
pub use inbound_envelope::*;
pub use ingestion_pipeline::*;
