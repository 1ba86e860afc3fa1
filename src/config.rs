// IMPORTANT:
// Keep ALL numeric values and fixed names centralized here (repo rule: no hardcoded values scattered around).

// NOTE: APP_VERSION must stay in sync with the `version` field in Cargo.toml.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod logging {
    pub const LOG_FILE_NAME: &str = "csv_embedder";
    pub const DEFAULT_LOG_SPEC: &str = "info";

    pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
    pub const LOG_ROTATE_KEEP_FILES: usize = 5;
}

pub mod model {
    pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

    // Hard cap on word-piece tokens per input. Longer inputs are silently truncated.
    // The model's own max_position_embeddings lowers this further when smaller.
    pub const MAX_TOKENS: usize = 512;

    pub const CONFIG_FILE: &str = "config.json";
    pub const TOKENIZER_FILE: &str = "tokenizer.json";
    pub const SAFETENSORS_FILE: &str = "model.safetensors";
    pub const PYTORCH_FILE: &str = "pytorch_model.bin";
}

pub mod hub {
    pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
    pub const ENDPOINT_ENV: &str = "HF_ENDPOINT";
    pub const TOKEN_ENV: &str = "HF_TOKEN";
    pub const REVISION: &str = "main";

    // Overrides the whole cache root when set.
    pub const CACHE_DIR_ENV: &str = "CSV_EMBEDDER_CACHE";
    pub const CACHE_DIR_REL: &str = ".cache/csv-embedder/models";

    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 90;
    pub const DOWNLOAD_CHUNK_BYTES: usize = 1024 * 1024;

    pub const SHA256_SUFFIX: &str = "sha256";
    pub const TMP_SUFFIX: &str = "tmp";
}

pub mod table {
    pub const DEFAULT_INPUT_PATH: &str = "data/file.csv";
    pub const DEFAULT_OUTPUT_DIR: &str = "Models";
    pub const DEFAULT_OUTPUT_FILE: &str = "embeddings.csv";

    pub const EMBEDDINGS_COLUMN: &str = "embeddings";
    pub const TMP_SUFFIX: &str = "tmp";

    pub const PROGRESS_LOG_EVERY: usize = 100;
}
