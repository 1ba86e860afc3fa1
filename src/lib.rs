//! Embed a text column of a CSV file with a pretrained BERT-family encoder.
//!
//! ```no_run
//! use csv_embedder::{EmbeddingGenerator, GeneratorOptions};
//!
//! let generator = EmbeddingGenerator::load(GeneratorOptions {
//!     input_path: "data/products.csv".into(),
//!     ..GeneratorOptions::default()
//! })?;
//! let vector = generator.embed("Sample product description.")?;
//! generator.embed_table("description", "output", "product_embeddings.csv")?;
//! # Ok::<(), csv_embedder::EmbedError>(())
//! ```

pub mod cli;
pub mod config;
pub mod device;
pub mod embeddings;
pub mod error;
pub mod generator;
pub mod logging;
pub mod table;

pub use device::{ComputeTarget, DevicePreference};
pub use embeddings::engine::{BertEncoder, TextEncoder};
pub use error::{EmbedError, Result};
pub use generator::{EmbeddingGenerator, GeneratorOptions};
