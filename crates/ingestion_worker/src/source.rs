mod envelope_source;
mod json_lines_source;

pub use envelope_source::*;
pub use json_lines_source::*;
