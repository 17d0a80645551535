#![forbid(unsafe_code)]

pub mod repository;
pub mod seed;
pub mod selection;
pub mod sqlite;

pub use repository::{Storage, StorageError};
