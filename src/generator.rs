// generator.rs — Text → vector and CSV column → CSV column of vectors.
//
// The generator owns its encoder for its whole lifetime; the model is released when
// the generator is dropped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config;
use crate::device::{self, ComputeTarget, DevicePreference};
use crate::embeddings::download;
use crate::embeddings::engine::{BertEncoder, TextEncoder};
use crate::error::{EmbedError, Result};
use crate::table;

/// Construction-time options. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Hub repo id or local model directory.
    pub model_id: String,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub device: DevicePreference,
    /// L2-normalize vectors after pooling.
    pub normalize: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            model_id: config::model::DEFAULT_MODEL_ID.to_string(),
            input_path: PathBuf::from(config::table::DEFAULT_INPUT_PATH),
            output_dir: PathBuf::from(config::table::DEFAULT_OUTPUT_DIR),
            device: DevicePreference::Auto,
            normalize: false,
        }
    }
}

pub struct EmbeddingGenerator<E = BertEncoder> {
    model_id: Option<String>,
    encoder: E,
    input_path: PathBuf,
    output_dir: PathBuf,
}

impl EmbeddingGenerator<BertEncoder> {
    /// Load the tokenizer and encoder named by `options.model_id` onto the selected device.
    pub fn load(options: GeneratorOptions) -> Result<Self> {
        Self::load_with_probe(options, device::accelerator_available())
    }

    /// Like [`EmbeddingGenerator::load`], with accelerator availability supplied by the caller.
    pub fn load_with_probe(options: GeneratorOptions, accelerator_available: bool) -> Result<Self> {
        let target = device::select_target(options.device, accelerator_available);
        log::info!(
            "Device preference {} resolved to {:?} (accelerator available: {})",
            options.device,
            target,
            accelerator_available
        );

        let encoder = load_encoder(&options, target)
            .map_err(|e| EmbedError::model_load(&options.model_id, e))?;

        log::info!("Using device: {}", device::describe(encoder.device()));
        log::info!("Model: {}", options.model_id);

        Ok(Self {
            model_id: Some(options.model_id),
            encoder,
            input_path: options.input_path,
            output_dir: options.output_dir,
        })
    }

    pub fn device(&self) -> &candle_core::Device {
        self.encoder.device()
    }
}

fn load_encoder(options: &GeneratorOptions, target: ComputeTarget) -> anyhow::Result<BertEncoder> {
    let device = device::create_device(options.device, target)?;
    let files = download::resolve_model(&options.model_id)?;
    BertEncoder::load(&files, &device, options.normalize)
}

impl<E: TextEncoder> EmbeddingGenerator<E> {
    /// Wrap an already-loaded encoder.
    pub fn with_encoder(encoder: E, input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_id: None,
            encoder,
            input_path: input_path.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn hidden_size(&self) -> usize {
        self.encoder.hidden_size()
    }

    /// Embed one text. Inputs past the token cap are silently truncated.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.encoder.embed(text).map_err(EmbedError::inference)
    }

    /// Embed every value of `column` in the input table and write the table, plus an
    /// `embeddings` column, to `output_directory/output_file`. Returns the written path.
    ///
    /// Nothing is written unless every row succeeds.
    pub fn embed_table(
        &self,
        column: &str,
        output_directory: impl AsRef<Path>,
        output_file: &str,
    ) -> Result<PathBuf> {
        let input = table::read_table(&self.input_path)?;
        let idx = input
            .column_index(column)
            .ok_or_else(|| EmbedError::ColumnNotFound {
                column: column.to_string(),
                path: self.input_path.clone(),
                available: input.column_names(),
            })?;

        let total = input.rows.len();
        log::info!(
            "Embedding column `{}` of {} ({} rows)",
            column,
            self.input_path.display(),
            total
        );

        let mut cells = Vec::with_capacity(total);
        for (i, row) in input.rows.iter().enumerate() {
            let text = row.get(idx).unwrap_or_default();
            let vector = self.embed(text).map_err(|e| match e {
                EmbedError::Inference(reason) => EmbedError::Inference(format!("row {}: {reason}", i + 1)),
                other => other,
            })?;
            let cell = table::format_vector(&vector)
                .map_err(|e| EmbedError::Inference(format!("row {}: serialize vector: {e}", i + 1)))?;
            cells.push(cell);

            if (i + 1) % config::table::PROGRESS_LOG_EVERY == 0 {
                log::info!("Embedded {}/{} rows", i + 1, total);
            }
        }

        let output = input.with_column(config::table::EMBEDDINGS_COLUMN, cells);
        let dest = table::write_table(&output, output_directory.as_ref(), output_file)?;
        log::info!("Wrote {} rows to {}", total, dest.display());
        Ok(dest)
    }

    /// [`EmbeddingGenerator::embed_table`] into the configured output directory.
    pub fn embed_table_default(&self, column: &str, output_file: &str) -> Result<PathBuf> {
        self.embed_table(column, &self.output_dir, output_file)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::embeddings::engine::testing;

    /// Deterministic stand-in: [chars, words, first byte].
    struct CountingEncoder;

    impl TextEncoder for CountingEncoder {
        fn hidden_size(&self) -> usize {
            3
        }

        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if text == "boom" {
                anyhow::bail!("forward pass exploded");
            }
            Ok(vec![
                text.chars().count() as f32,
                text.split_whitespace().count() as f32,
                text.bytes().next().unwrap_or(0) as f32,
            ])
        }
    }

    fn setup(content: &str) -> (tempfile::TempDir, EmbeddingGenerator<CountingEncoder>) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("products.csv");
        fs::write(&input, content).unwrap();
        let generator = EmbeddingGenerator::with_encoder(CountingEncoder, input, dir.path().join("Models"));
        (dir, generator)
    }

    fn parse_vector(cell: &str) -> Vec<f32> {
        serde_json::from_str(cell).unwrap()
    }

    #[test]
    fn test_default_options() {
        let options = GeneratorOptions::default();
        assert_eq!(options.model_id, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(options.input_path, PathBuf::from("data/file.csv"));
        assert_eq!(options.output_dir, PathBuf::from("Models"));
        assert_eq!(options.device, DevicePreference::Auto);
        assert!(!options.normalize);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: GeneratorOptions =
            serde_json::from_str(r#"{"model_id": "./local-model", "device": "cpu"}"#).unwrap();
        assert_eq!(options.model_id, "./local-model");
        assert_eq!(options.device, DevicePreference::Cpu);
        assert_eq!(options.output_dir, PathBuf::from("Models"));
    }

    #[test]
    fn test_embed_table_scenario() {
        let (dir, generator) = setup("id,description,price\n1,red shoes,10\n2,blue hat,5\n");
        let out_dir = dir.path().join("out");
        let dest = generator.embed_table("description", &out_dir, "product_embeddings.csv").unwrap();
        assert_eq!(dest, out_dir.join("product_embeddings.csv"));

        let table = table::read_table(&dest).unwrap();
        assert_eq!(table.column_names(), vec!["id", "description", "price", "embeddings"]);
        assert_eq!(table.rows.len(), 2);

        let first: Vec<&str> = table.rows[0].iter().collect();
        assert_eq!(&first[..3], &["1", "red shoes", "10"]);
        assert_eq!(parse_vector(first[3]), vec![9.0, 2.0, b'r' as f32]);

        let second: Vec<&str> = table.rows[1].iter().collect();
        assert_eq!(&second[..3], &["2", "blue hat", "5"]);
        assert_eq!(parse_vector(second[3]), vec![8.0, 2.0, b'b' as f32]);
    }

    #[test]
    fn test_embed_table_preserves_order_and_count() {
        let texts: Vec<String> = (0..250).map(|i| "x".repeat(i % 17 + 1)).collect();
        let content = std::iter::once("text".to_string())
            .chain(texts.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n");
        let (_dir, generator) = setup(&content);
        let dest = generator.embed_table_default("text", "out.csv").unwrap();
        assert_eq!(dest, generator.output_dir().join("out.csv"));

        let table = table::read_table(&dest).unwrap();
        assert_eq!(table.rows.len(), texts.len());
        for (row, text) in table.rows.iter().zip(&texts) {
            assert_eq!(row.get(0), Some(text.as_str()));
            assert_eq!(parse_vector(row.get(1).unwrap())[0], text.len() as f32);
        }
    }

    #[test]
    fn test_missing_column_writes_nothing() {
        let (dir, generator) = setup("id,description\n1,red shoes\n");
        let out_dir = dir.path().join("out");
        let err = generator.embed_table("title", &out_dir, "x.csv").unwrap_err();
        match err {
            EmbedError::ColumnNotFound { column, available, .. } => {
                assert_eq!(column, "title");
                assert_eq!(available, vec!["id", "description"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!out_dir.join("x.csv").exists());
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let generator = EmbeddingGenerator::with_encoder(CountingEncoder, dir.path().join("missing.csv"), "Models");
        let out_dir = dir.path().join("out");
        let err = generator.embed_table("description", &out_dir, "x.csv").unwrap_err();
        assert!(matches!(err, EmbedError::TableRead { .. }));
        assert!(!out_dir.join("x.csv").exists());
    }

    #[test]
    fn test_inference_failure_writes_nothing() {
        let (dir, generator) = setup("text\nfine\nboom\nalso fine\n");
        let out_dir = dir.path().join("out");
        let err = generator.embed_table("text", &out_dir, "x.csv").unwrap_err();
        match err {
            EmbedError::Inference(reason) => {
                assert!(reason.contains("row 2"), "{reason}");
                assert!(reason.contains("forward pass exploded"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!out_dir.join("x.csv").exists());
    }

    #[test]
    fn test_failed_run_keeps_previous_output() {
        let (dir, generator) = setup("text\nboom\n");
        let out_dir = dir.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("x.csv"), "previous").unwrap();
        assert!(generator.embed_table("text", &out_dir, "x.csv").is_err());
        assert_eq!(fs::read_to_string(out_dir.join("x.csv")).unwrap(), "previous");
    }

    #[test]
    fn test_empty_cells_are_embedded() {
        let (dir, generator) = setup("id,text\n1,\n2,hi\n");
        let dest = generator.embed_table("text", dir.path(), "out.csv").unwrap();
        let table = table::read_table(&dest).unwrap();
        assert_eq!(parse_vector(table.rows[0].get(2).unwrap()), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bert_generator_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("products.csv");
        fs::write(&input, "description\nred shoes\nblue hat\n").unwrap();
        let generator = EmbeddingGenerator::with_encoder(testing::tiny_encoder(false), &input, dir.path());

        let a = generator.embed("red shoes").unwrap();
        assert_eq!(a.len(), testing::HIDDEN_SIZE);
        assert_eq!(a, generator.embed("red shoes").unwrap());

        let dest = generator.embed_table("description", dir.path().join("out"), "e.csv").unwrap();
        let table = table::read_table(&dest).unwrap();
        assert_eq!(table.rows.len(), 2);
        for row in &table.rows {
            assert_eq!(parse_vector(row.get(1).unwrap()).len(), testing::HIDDEN_SIZE);
        }
    }

    #[test]
    fn test_load_with_bad_model_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions {
            model_id: dir.path().to_string_lossy().to_string(),
            device: DevicePreference::Cpu,
            ..GeneratorOptions::default()
        };
        let err = EmbeddingGenerator::load_with_probe(options, false).err().unwrap();
        assert!(matches!(err, EmbedError::ModelLoad { .. }));
    }

    #[test]
    fn test_with_encoder_accessors() {
        let (dir, generator) = setup("text\nhi\n");
        assert_eq!(generator.model_id(), None);
        assert_eq!(generator.input_path(), dir.path().join("products.csv"));
        assert_eq!(generator.output_dir(), dir.path().join("Models"));
        assert_eq!(generator.hidden_size(), 3);
    }

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    #[test]
    fn test_auto_with_failing_accelerator_falls_back_to_cpu() {
        // The accelerator is reported available but cannot be created; loading goes on
        // with the CPU and only fails later on the empty model directory.
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions {
            model_id: dir.path().to_string_lossy().to_string(),
            device: DevicePreference::Auto,
            ..GeneratorOptions::default()
        };
        let err = EmbeddingGenerator::load_with_probe(options, true).err().unwrap();
        match err {
            EmbedError::ModelLoad { reason, .. } => {
                assert!(reason.contains("config.json"), "{reason}");
                assert!(!reason.contains("accelerator"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    #[test]
    fn test_forced_accelerator_without_backend_is_model_load_error() {
        let options = GeneratorOptions {
            device: DevicePreference::Accelerator,
            ..GeneratorOptions::default()
        };
        let err = EmbeddingGenerator::load_with_probe(options, true).err().unwrap();
        match err {
            EmbedError::ModelLoad { reason, .. } => assert!(reason.contains("accelerator"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
