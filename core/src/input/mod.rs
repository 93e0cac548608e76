//! Task and worker submission documents (JSON).

mod parser;

pub use parser::{InputParser, TaskDocument, WorkerDocument};
