pub mod common;
pub mod document;
pub mod instance;

pub use common::*;
pub use document::*;
pub use instance::*;
