mod json_pointer;

pub use json_pointer::JsonPointerClassifier;
