pub mod ast;
pub mod binder;
pub mod compiler;
pub mod plan;
pub mod request;
pub mod sort;
