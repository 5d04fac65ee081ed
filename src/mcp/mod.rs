pub mod arguments;
pub mod handler;
pub mod protocol;
pub mod tools;
