//! File-based persistence.

mod token_repository;

pub use token_repository::FileTokenRepository;
