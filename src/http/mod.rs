//! HTTP protocol layer module
//!
//! Response construction shared by all routes, decoupled from route logic.

pub mod response;

// Re-export commonly used builders
pub use response::{
    build_400_response, build_404_response, build_405_response, build_413_response,
    build_health_response, build_object_response, build_text_response, json_response,
};
