// download.rs — Model file resolution and download with SHA256 bookkeeping.
//
// A model identifier is either a local directory or a Hugging Face hub repo id.
// Hub files are fetched on first use and cached locally; each cached file carries a
// `<file>.sha256` sidecar and is re-downloaded when its bytes no longer match it.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use sha2::{Digest, Sha256};

use crate::config;

/// Local paths of everything needed to build an encoder.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Pick the files out of a directory, preferring safetensors weights.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let config = dir.join(config::model::CONFIG_FILE);
        let tokenizer = dir.join(config::model::TOKENIZER_FILE);
        if !config.is_file() {
            bail!("{} not found", config.display());
        }
        if !tokenizer.is_file() {
            bail!("{} not found", tokenizer.display());
        }

        let weights = [config::model::SAFETENSORS_FILE, config::model::PYTORCH_FILE]
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
            .with_context(|| {
                format!(
                    "no weights in {} (expected {} or {})",
                    dir.display(),
                    config::model::SAFETENSORS_FILE,
                    config::model::PYTORCH_FILE
                )
            })?;

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    pub fn is_safetensors(&self) -> bool {
        self.weights
            .extension()
            .is_some_and(|ext| ext == "safetensors")
    }
}

/// Resolve a model identifier to local files, downloading from the hub if needed.
pub fn resolve_model(model_id: &str) -> anyhow::Result<ModelFiles> {
    let local = Path::new(model_id);
    if local.is_dir() {
        log::info!("Using local model directory {}", local.display());
        return ModelFiles::from_dir(local);
    }

    validate_repo_id(model_id)?;
    let dir = cache_root()?.join(cache_dir_name(model_id));
    ensure_hub_files(model_id, &dir)?;
    ModelFiles::from_dir(&dir)
}

/// Reject ids that could escape the cache directory or are not hub-shaped.
pub fn validate_repo_id(model_id: &str) -> anyhow::Result<()> {
    if model_id.trim().is_empty() {
        bail!("empty model identifier");
    }
    if model_id.starts_with('/') || model_id.contains('\\') {
        bail!("`{model_id}` is neither a local directory nor a hub repo id");
    }
    let segments: Vec<&str> = model_id.split('/').collect();
    if segments.len() > 2 || segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        bail!("`{model_id}` is neither a local directory nor a hub repo id");
    }
    Ok(())
}

/// Directory name for a repo id inside the cache (`owner/name` → `owner--name`).
pub fn cache_dir_name(model_id: &str) -> String {
    model_id.replace('/', "--")
}

fn cache_root() -> anyhow::Result<PathBuf> {
    if let Ok(v) = std::env::var(config::hub::CACHE_DIR_ENV) {
        if !v.is_empty() {
            return Ok(PathBuf::from(v));
        }
    }
    Ok(dirs_home()?.join(config::hub::CACHE_DIR_REL))
}

fn hub_endpoint() -> String {
    std::env::var(config::hub::ENDPOINT_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config::hub::DEFAULT_ENDPOINT.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Download config, tokenizer and weights into `dir` unless already cached.
fn ensure_hub_files(model_id: &str, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create model dir {}", dir.display()))?;

    let base = format!("{}/{}/resolve/{}", hub_endpoint(), model_id, config::hub::REVISION);

    for name in [config::model::CONFIG_FILE, config::model::TOKENIZER_FILE] {
        if !fetch_cached(&base, dir, name)? {
            bail!("{name} not found in hub repo {model_id}");
        }
    }

    // Older repos only ship pytorch weights.
    if !fetch_cached(&base, dir, config::model::SAFETENSORS_FILE)? {
        log::info!("{} has no safetensors weights, trying {}", model_id, config::model::PYTORCH_FILE);
        if !fetch_cached(&base, dir, config::model::PYTORCH_FILE)? {
            bail!("no weights found in hub repo {model_id}");
        }
    }

    Ok(())
}

/// Ensure `dir/name` is present and intact. Returns false if the hub has no such file.
fn fetch_cached(base: &str, dir: &Path, name: &str) -> anyhow::Result<bool> {
    let dest = dir.join(name);
    if cached_file_valid(&dest)? {
        log::debug!("{} already cached at {}", name, dest.display());
        return Ok(true);
    }

    let url = format!("{base}/{name}");
    let Some(digest) = download_to(&url, &dest)? else {
        return Ok(false);
    };

    fs::write(sidecar_path(&dest), &digest)
        .with_context(|| format!("failed to write digest for {}", dest.display()))?;
    Ok(true)
}

fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(config::hub::SHA256_SUFFIX);
    file.with_file_name(name)
}

/// A cached file is valid when it exists and matches its recorded SHA256.
pub fn cached_file_valid(file: &Path) -> anyhow::Result<bool> {
    let sidecar = sidecar_path(file);
    if !file.is_file() || !sidecar.is_file() {
        return Ok(false);
    }
    let expected = fs::read_to_string(&sidecar)
        .with_context(|| format!("failed to read {}", sidecar.display()))?;
    let actual = sha256_file(file)?;
    if actual != expected.trim() {
        log::warn!(
            "SHA256 mismatch for cached {}: expected {}, got {}; downloading again",
            file.display(),
            expected.trim(),
            actual
        );
        return Ok(false);
    }
    Ok(true)
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; config::hub::DOWNLOAD_CHUNK_BYTES];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Stream a URL into `dest`, returning its SHA256, or `None` on HTTP 404.
fn download_to(url: &str, dest: &Path) -> anyhow::Result<Option<String>> {
    let filename = dest.file_name().unwrap_or_default().to_string_lossy();
    log::info!("Downloading {} from {}", filename, url);

    let mut req = ureq::get(url).timeout(std::time::Duration::from_secs(config::hub::DOWNLOAD_TIMEOUT_SECS));
    if let Ok(token) = std::env::var(config::hub::TOKEN_ENV) {
        if !token.is_empty() {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
    }

    let resp = match req.call() {
        Ok(resp) => resp,
        Err(ureq::Error::Status(404, _)) => return Ok(None),
        Err(ureq::Error::Status(code, _)) => bail!("HTTP {code} downloading {url}"),
        Err(e) => return Err(e).with_context(|| format!("failed to download {url}")),
    };

    let (digest, total) =
        store_body(resp.into_reader(), dest).with_context(|| format!("failed to download {url}"))?;

    log::info!("Downloaded {} ({} bytes, sha256 {})", filename, total, &digest[..12]);
    Ok(Some(digest))
}

/// Write `reader` to `dest` atomically (via `.tmp` + rename), returning its SHA256
/// and byte count. On failure neither `dest` nor the `.tmp` file is left behind.
fn store_body(reader: impl Read, dest: &Path) -> anyhow::Result<(String, u64)> {
    let tmp_path = dest.with_extension(config::hub::TMP_SUFFIX);
    let stored = stream_to_file(reader, &tmp_path).and_then(|v| {
        fs::rename(&tmp_path, dest)
            .with_context(|| format!("failed to rename {} -> {}", tmp_path.display(), dest.display()))?;
        Ok(v)
    });
    if stored.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    stored
}

fn stream_to_file(mut reader: impl Read, path: &Path) -> anyhow::Result<(String, u64)> {
    let mut file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; config::hub::DOWNLOAD_CHUNK_BYTES];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut buf).context("failed to read response body")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])?;
        total += n as u64;
    }
    file.flush()?;
    Ok((hex::encode(hasher.finalize()), total))
}

/// Get the user's home directory.
fn dirs_home() -> anyhow::Result<PathBuf> {
    // Use $HOME on all platforms (macOS, Linux, Windows via MSYS/Git Bash)
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .context("cannot determine home directory (neither HOME nor USERPROFILE is set)")
}
