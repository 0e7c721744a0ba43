// Common tools
pub mod utils;
