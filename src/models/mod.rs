pub mod common;
pub mod guest;
pub mod verification_code;

pub use common::*;
pub use guest::*;
pub use verification_code::*;
