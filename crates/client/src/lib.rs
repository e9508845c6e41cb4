pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod response;
pub mod retry;
pub mod schema;
pub mod spill;

#[cfg(test)]
mod tests;
