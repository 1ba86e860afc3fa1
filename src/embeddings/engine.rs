// engine.rs — Candle BERT embedding engine with attention-mask-aware mean pooling.
//
// Loads any BERT-family checkpoint (safetensors or pytorch weights) and produces one
// hidden_size vector per input text by averaging the final hidden states over tokens.

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams};

use crate::config;
use crate::embeddings::download::ModelFiles;

/// Anything that turns text into a fixed-length vector.
pub trait TextEncoder {
    /// Length of every vector returned by [`TextEncoder::embed`].
    fn hidden_size(&self) -> usize;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// The embedding engine holds the loaded model and tokenizer.
pub struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
    max_tokens: usize,
    normalize: bool,
}

impl BertEncoder {
    /// Load config, weights and tokenizer onto `device`.
    pub fn load(files: &ModelFiles, device: &Device, normalize: bool) -> anyhow::Result<Self> {
        let config = read_config(&files.config)?;

        log::info!(
            "Loading embedding model: hidden_size={}, layers={}, heads={}, max_positions={}",
            config.hidden_size,
            config.num_hidden_layers,
            config.num_attention_heads,
            config.max_position_embeddings,
        );

        let weights = &files.weights;
        let vb = if files.is_safetensors() {
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights.clone()], DType::F32, device)
                    .with_context(|| format!("load weights from {}", weights.display()))?
            }
        } else {
            VarBuilder::from_pth(weights, DType::F32, device)
                .with_context(|| format!("load weights from {}", weights.display()))?
        };

        let model = BertModel::load(vb, &config).context("load BERT model")?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("load tokenizer {}: {e}", files.tokenizer.display()))?;

        let encoder = Self::from_parts(model, tokenizer, &config, device.clone(), normalize)?;
        log::info!("Embedding model loaded successfully (dims={})", encoder.hidden_size);
        Ok(encoder)
    }

    /// Assemble an encoder from already-built pieces. Configures the tokenizer for
    /// single-sequence use: truncation at the token cap, no padding.
    pub fn from_parts(
        model: BertModel,
        mut tokenizer: Tokenizer,
        config: &BertConfig,
        device: Device,
        normalize: bool,
    ) -> anyhow::Result<Self> {
        let max_tokens = config::model::MAX_TOKENS.min(config.max_position_embeddings);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("configure truncation: {e}"))?;
        tokenizer.with_padding(None);

        Ok(Self {
            model,
            tokenizer,
            device,
            hidden_size: config.hidden_size,
            max_tokens,
            normalize,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

impl TextEncoder for BertEncoder {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Generate a sentence embedding for the given text.
    /// Returns a Vec<f32> of `hidden_size` dimensions.
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenize: {e}"))?;

        // Truncation is configured on the tokenizer; the slice only guards custom tokenizers.
        let len = encoding.get_ids().len().min(self.max_tokens);
        let token_ids = &encoding.get_ids()[..len];
        let attention_mask = &encoding.get_attention_mask()[..len];

        if token_ids.is_empty() {
            // Nothing to run the network on (tokenizer without special tokens, empty text)
            return Ok(vec![0.0; self.hidden_size]);
        }

        // Create tensors [1, seq_len]
        let token_ids_t = Tensor::new(
            token_ids.iter().map(|&id| id as i64).collect::<Vec<_>>().as_slice(),
            &self.device,
        )?
        .unsqueeze(0)?;

        let attention_mask_t = Tensor::new(
            attention_mask.iter().map(|&m| m as i64).collect::<Vec<_>>().as_slice(),
            &self.device,
        )?
        .unsqueeze(0)?;

        let token_type_ids = token_ids_t.zeros_like()?;

        // Forward pass → [1, seq_len, hidden_size]. Plain tensors carry no gradient graph.
        let output = self
            .model
            .forward(&token_ids_t, &token_type_ids, Some(&attention_mask_t))?;

        let mut embedding = mean_pooling(&output, &attention_mask_t)?;
        if self.normalize {
            embedding = l2_normalize(&embedding)?;
        }

        // to_vec1 copies back to host memory for accelerator devices
        let emb_vec: Vec<f32> = embedding.squeeze(0)?.to_vec1()?;

        if emb_vec.len() != self.hidden_size {
            bail!(
                "unexpected embedding dims: got {}, expected {}",
                emb_vec.len(),
                self.hidden_size
            );
        }

        Ok(emb_vec)
    }
}

fn read_config(path: &Path) -> anyhow::Result<BertConfig> {
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&config_str).with_context(|| format!("parse {}", path.display()))
}

/// Attention-mask-aware mean pooling.
///
/// For each position, multiply the hidden state by the attention mask (0 or 1),
/// then sum across positions and divide by the number of non-masked positions.
/// For a single unpadded sequence this is the plain mean over tokens.
///
/// input_embeds: [batch, seq_len, hidden_size]
/// attention_mask: [batch, seq_len] (1 for real tokens, 0 for padding)
/// output: [batch, hidden_size]
fn mean_pooling(input_embeds: &Tensor, attention_mask: &Tensor) -> anyhow::Result<Tensor> {
    // Expand attention mask to match hidden dims: [batch, seq_len] → [batch, seq_len, 1]
    let mask_expanded = attention_mask
        .to_dtype(DType::F32)?
        .unsqueeze(2)?
        .broadcast_as(input_embeds.shape())?;

    let sum_embeddings = (input_embeds * &mask_expanded)?.sum(1)?;

    // Clamp to avoid div by zero
    let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

    Ok((sum_embeddings / sum_mask)?)
}

/// L2 normalize a tensor along the last dimension.
fn l2_normalize(tensor: &Tensor) -> anyhow::Result<Tensor> {
    let norm = tensor.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = norm.clamp(1e-12, f64::MAX)?;
    Ok(tensor.broadcast_div(&norm)?)
}
