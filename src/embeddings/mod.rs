//! Embedding generation and vector similarity matching
//!
//! `generator` turns query/record text into fixed-length vectors via the
//! OpenAI embeddings endpoint; `matcher` carries the canonical pgvector
//! wire encoding and the server-side `match_documents` call.

pub mod generator;
pub mod matcher;

pub use generator::{CachingEmbedder, Embedder, OpenAiEmbedder};
pub use matcher::{encode_vector, match_documents};
