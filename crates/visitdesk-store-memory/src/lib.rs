//! In-memory backend for the visitdesk store.
//!
//! Everything lives behind one [`tokio::sync::RwLock`]; nothing survives a
//! restart. Useful for demos and as a reference for the SQLite backend's
//! semantics.

mod store;

pub use store::MemoryStore;

#[cfg(test)]
mod tests;
