pub mod extract;
pub mod lines;
pub mod segment;

pub use extract::{extract_fields, extract_fields_with, FunctionFields};
pub use lines::{HeadingMatch, Line, LineClassifier, PatternError, PatternSet};
pub use segment::{segment, segment_with, Block};
