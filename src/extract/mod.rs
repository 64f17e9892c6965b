pub mod extractor;
pub mod patterns;

pub use extractor::{
    format_tuple, ArgTuple, ExtractOutcome, TestCaseBucket, TestCaseExtractor,
    FATAL_ERROR_THRESHOLD, OUTPUT_LOG_NAME,
};
pub use patterns::{VulnClass, PAYLOAD_MARKER};
