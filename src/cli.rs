use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config;
use crate::device::DevicePreference;
use crate::generator::GeneratorOptions;

#[derive(Debug, Parser)]
#[command(name = "csv_embedder", version, about = "Embed text with a pretrained BERT-family encoder")]
pub struct Cli {
    /// Hub repo id or local directory with config.json, tokenizer.json and weights
    #[arg(long, global = true, default_value = config::model::DEFAULT_MODEL_ID)]
    pub model: String,

    /// auto, cpu or accelerator
    #[arg(long, global = true, default_value_t = DevicePreference::Auto)]
    pub device: DevicePreference,

    /// L2-normalize embeddings
    #[arg(long, global = true)]
    pub normalize: bool,

    /// Write logs to a rotating file in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log specification, e.g. `debug` or `info,csv_embedder=trace` (defaults to RUST_LOG, then info)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Embed one column of a CSV file and write it back with an `embeddings` column
    Table {
        /// Text column to embed
        #[arg(long)]
        column: String,

        #[arg(long, default_value = config::table::DEFAULT_INPUT_PATH)]
        input: PathBuf,

        #[arg(long, default_value = config::table::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        #[arg(long, default_value = config::table::DEFAULT_OUTPUT_FILE)]
        output_file: String,
    },
    /// Print the embedding of a single text as a JSON list
    Text { text: String },
}

impl Cli {
    pub fn generator_options(&self) -> GeneratorOptions {
        let mut options = GeneratorOptions {
            model_id: self.model.clone(),
            device: self.device,
            normalize: self.normalize,
            ..GeneratorOptions::default()
        };
        if let Command::Table { input, output_dir, .. } = &self.command {
            options.input_path = input.clone();
            options.output_dir = output_dir.clone();
        }
        options
    }
}
