//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the book data access contract.
//! - Isolate SQL details from the async service layer.
//!
//! # Invariants
//! - Repositories run inside a transaction opened by the caller and never
//!   open or commit transactions themselves.
//! - Read paths reject malformed persisted rows instead of masking them.

pub mod book_repo;
