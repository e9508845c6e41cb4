pub mod error;
pub mod filter;
pub mod odata;
pub mod request;
