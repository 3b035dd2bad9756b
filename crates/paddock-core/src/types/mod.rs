//! Shared data types for the Paddock framework.

pub mod enums;
pub mod order;

pub use enums::*;
pub use order::*;
