pub mod cache;
pub mod decrypt;
