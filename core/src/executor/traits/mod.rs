pub mod classifier;
pub mod strategy;
pub mod worker;

pub use classifier::*;
pub use strategy::*;
pub use worker::*;
