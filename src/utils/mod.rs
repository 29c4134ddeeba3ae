//! Shared helpers.

pub mod json_extraction;

pub use json_extraction::{
    extract_from_code_block, extract_last_json_object, find_matching_brace,
    try_extract_json_object, JsonExtraction, JsonExtractionError,
};
