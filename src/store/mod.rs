mod chunk_store;
mod por;

pub use chunk_store::{ChunkStore, StoreOutcome, StoreStats};
pub use por::{generate_proof, verify_proof};
