//! Strategy engine module
//!
//! Turns strategy scripts into condition trees and evaluates them against indicator series.

pub mod condition;
pub mod evaluator;
pub mod parser;
pub mod signal;

pub use condition::*;
pub use evaluator::*;
pub use parser::*;
pub use signal::*;
