pub mod condition;
pub mod expr;
pub mod render;
