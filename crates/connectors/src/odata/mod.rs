pub mod entity;
pub mod http;
pub mod metadata;
pub mod service;
