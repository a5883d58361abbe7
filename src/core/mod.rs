// Core modules implementing the dynamic JSON bridge and error modeling.
pub mod codec;
pub mod error;
pub mod node;
pub mod sink;
pub mod timestamp;
pub mod value;
