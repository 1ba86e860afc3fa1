// embeddings/ — Local sentence embedding engine using candle (pure Rust).
//
// Provides:
// - Model resolution: local directory or hub download with SHA256 bookkeeping
// - BERT inference with mean pooling

pub mod download;
pub mod engine;
