//! Picture-book domain model.
//!
//! # Responsibility
//! - Define the caller-side candidate (`BookInput`) and the persisted
//!   record (`Book`) shapes.
//! - Keep pages embedded in their book; pages have no identity of their own.
//!
//! # Invariants
//! - A persisted `Book` always carries a store-issued `BookId` and both
//!   timestamps.
//! - Media payloads are opaque bytes and are never transcoded.

pub mod book;
