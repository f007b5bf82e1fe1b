//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, codec, connection acquisition and repository
//!   calls into async CRUD entry points.
//! - Keep CLI/embedder layers decoupled from storage details.

pub mod book_service;
