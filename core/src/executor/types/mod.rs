pub mod assignment;
pub mod result;
pub mod task;

pub use assignment::*;
pub use result::*;
pub use task::*;
