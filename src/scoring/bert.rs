//! BERT sentence embeddings with Candle: mean of the final hidden state over tokens.

use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::api::sync::Api;
use serde_json::{json, Value};
use tokenizers::{Tokenizer, TruncationParams};

use super::{EmbedError, Embedder};

pub const DEFAULT_MODEL: &str = "allenai/scibert_scivocab_uncased";

/// Inputs are cut to this many tokens, `[CLS]` and `[SEP]` included.
pub const MAX_TOKENS: usize = 256;

/// Where model files come from: a local directory or a Hugging Face Hub repo id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Hub(String),
}

impl ModelSource {
    pub fn default_model() -> Self {
        Self::Hub(DEFAULT_MODEL.to_string())
    }

    fn describe(&self) -> String {
        match self {
            Self::Local(dir) => dir.display().to_string(),
            Self::Hub(id) => format!("hub:{id}"),
        }
    }
}

/// Model files resolved on disk. The optional ones each have a fallback.
struct ModelFiles {
    config: PathBuf,
    tokenizer_json: Option<PathBuf>,
    vocab: Option<PathBuf>,
    safetensors: Option<PathBuf>,
    pytorch: Option<PathBuf>,
}

impl ModelFiles {
    fn resolve(source: &ModelSource) -> Result<Self, EmbedError> {
        match source {
            ModelSource::Local(dir) => {
                let existing = |name: &str| Some(dir.join(name)).filter(|p| p.is_file());
                Ok(Self {
                    config: existing("config.json").ok_or_else(|| missing(source, "config.json", "not found"))?,
                    tokenizer_json: existing("tokenizer.json"),
                    vocab: existing("vocab.txt"),
                    safetensors: existing("model.safetensors"),
                    pytorch: existing("pytorch_model.bin"),
                })
            }
            ModelSource::Hub(id) => {
                tracing::info!(model = %id, "fetching model files from Hugging Face Hub");
                let api = Api::new().map_err(hub_error)?;
                let repo = api.model(id.clone());
                let config = repo
                    .get("config.json")
                    .map_err(|e| missing(source, "config.json", &e.to_string()))?;
                let tokenizer_json = repo.get("tokenizer.json").ok();
                let vocab = if tokenizer_json.is_none() {
                    repo.get("vocab.txt").ok()
                } else {
                    None
                };
                let safetensors = repo.get("model.safetensors").ok();
                let pytorch = if safetensors.is_none() {
                    repo.get("pytorch_model.bin").ok()
                } else {
                    None
                };
                Ok(Self {
                    config,
                    tokenizer_json,
                    vocab,
                    safetensors,
                    pytorch,
                })
            }
        }
    }
}

fn hub_error(e: impl std::fmt::Display) -> EmbedError {
    EmbedError::Hub(e.to_string())
}

fn missing(source: &ModelSource, file: &'static str, message: &str) -> EmbedError {
    EmbedError::MissingFile {
        file,
        source_name: source.describe(),
        message: message.to_string(),
    }
}

/// A pretrained BERT encoder plus its tokenizer, loaded once and shared read-only.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEmbedder {
    pub fn load(source: &ModelSource) -> Result<Self, EmbedError> {
        Self::load_with(source, MAX_TOKENS)
    }

    pub fn load_with(source: &ModelSource, max_tokens: usize) -> Result<Self, EmbedError> {
        let device = Device::Cpu;
        let files = ModelFiles::resolve(source)?;

        let config = load_config(&files.config)?;

        let tokenizer = match (&files.tokenizer_json, &files.vocab) {
            (Some(path), _) => Tokenizer::from_file(path)
                .map_err(|e| EmbedError::Tokenizer(format!("{}: {e}", path.display())))?,
            (None, Some(vocab)) => wordpiece_tokenizer(vocab)?,
            (None, None) => return Err(missing(source, "tokenizer.json", "no tokenizer.json or vocab.txt")),
        };

        let vb = match (&files.safetensors, &files.pytorch) {
            (Some(weights), _) => {
                tracing::info!(path = %weights.display(), "loading safetensors weights");
                // SAFETY: the weights file is not modified while mapped.
                unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DTYPE, &device)? }
            }
            (None, Some(weights)) => {
                tracing::info!(path = %weights.display(), "loading pytorch weights");
                VarBuilder::from_pth(weights, DTYPE, &device)?
            }
            (None, None) => {
                return Err(missing(source, "model.safetensors", "no model.safetensors or pytorch_model.bin"))
            }
        };
        let model = BertModel::load(vb, &config)?;
        tracing::info!(source = %source.describe(), "embedding model ready");

        Self::from_parts(model, tokenizer, device, max_tokens)
    }

    fn from_parts(
        model: BertModel,
        mut tokenizer: Tokenizer,
        device: Device,
        max_tokens: usize,
    ) -> Result<Self, EmbedError> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| EmbedError::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(None);
        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }
}

impl Embedder for BertEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbedError::Tokenizer(e.to_string()))?;
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        // [1, tokens, hidden]
        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;
        let pooled = hidden.mean(1)?.squeeze(0)?;
        Ok(pooled.to_vec1::<f32>()?)
    }
}

/// Parse `config.json`, filling keys that older BERT checkpoints omit.
fn load_config(path: &Path) -> Result<Config, EmbedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| EmbedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut value: Value = serde_json::from_str(&raw)?;
    tracing::info!(
        layers = value.get("num_hidden_layers").and_then(serde_json::Value::as_u64).unwrap_or_default(),
        hidden = value.get("hidden_size").and_then(serde_json::Value::as_u64).unwrap_or_default(),
        "loaded model config"
    );
    if let Some(obj) = value.as_object_mut() {
        obj.entry("layer_norm_eps").or_insert(json!(1e-12));
        obj.entry("pad_token_id").or_insert(json!(0));
        obj.entry("model_type").or_insert(json!("bert"));
    }
    Ok(serde_json::from_value(value)?)
}

/// Build an uncased BERT WordPiece tokenizer from a bare `vocab.txt`.
///
/// The tokenizer is described as `tokenizer.json` and loaded from that, one token
/// per line with the line index as its id.
pub fn wordpiece_tokenizer(vocab_path: &Path) -> Result<Tokenizer, EmbedError> {
    let raw = std::fs::read_to_string(vocab_path).map_err(|source| EmbedError::Io {
        path: vocab_path.to_path_buf(),
        source,
    })?;
    let vocab: serde_json::Map<String, Value> = raw
        .lines()
        .enumerate()
        .map(|(id, token)| (token.trim_end().to_string(), json!(id)))
        .collect();

    let id_of = |token: &str| {
        vocab
            .get(token)
            .and_then(Value::as_u64)
            .ok_or_else(|| EmbedError::Tokenizer(format!("{token} missing from {}", vocab_path.display())))
    };
    let cls = id_of("[CLS]")?;
    let sep = id_of("[SEP]")?;
    id_of("[UNK]")?;

    let definition = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "BertPreTokenizer" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", sep],
            "cls": ["[CLS]", cls]
        },
        "decoder": { "type": "WordPiece", "prefix": "##", "cleanup": true },
        "model": {
            "type": "WordPiece",
            "unk_token": "[UNK]",
            "continuing_subword_prefix": "##",
            "max_input_chars_per_word": 100,
            "vocab": vocab
        }
    });

    Tokenizer::from_bytes(definition.to_string().as_bytes())
        .map_err(|e| EmbedError::Tokenizer(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn write_vocab(dir: &Path) -> PathBuf {
        let path = dir.join("vocab.txt");
        std::fs::write(&path, "[PAD]\n[UNK]\n[CLS]\n[SEP]\nlane\nradar\nassist\n##s\n").unwrap();
        path
    }

    #[test]
    fn wordpiece_from_vocab() {
        let dir = tempfile::tempdir().unwrap();
        let tokenizer = wordpiece_tokenizer(&write_vocab(dir.path())).unwrap();
        let encoding = tokenizer.encode("Lane RADAR assists", true).unwrap();
        assert_eq!(encoding.get_ids(), &[2, 4, 5, 6, 7, 3]);
        let unknown = tokenizer.encode("fabric", true).unwrap();
        assert_eq!(unknown.get_ids(), &[2, 1, 3]);
    }

    #[test]
    fn wordpiece_requires_special_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "[PAD]\nlane\n").unwrap();
        assert!(matches!(wordpiece_tokenizer(&path), Err(EmbedError::Tokenizer(_))));
    }

    #[test]
    fn config_defaults_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"attention_probs_dropout_prob":0.1,"hidden_act":"gelu","hidden_dropout_prob":0.1,"hidden_size":768,"initializer_range":0.02,"intermediate_size":3072,"max_position_embeddings":512,"num_attention_heads":12,"num_hidden_layers":12,"type_vocab_size":2,"vocab_size":31090}"#,
        )
        .unwrap();
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn default_model_is_hub_repo() {
        assert_eq!(
            ModelSource::default_model(),
            ModelSource::Hub("allenai/scibert_scivocab_uncased".to_string())
        );
        assert_eq!(ModelSource::default_model().describe(), format!("hub:{DEFAULT_MODEL}"));
    }

    #[test]
    fn hub_failure_is_not_a_missing_file() {
        let err = hub_error("no cache directory");
        assert!(matches!(err, EmbedError::Hub(_)));
        assert_eq!(err.to_string(), "Hugging Face Hub unavailable: no cache directory");
    }

    const HIDDEN: usize = 8;

    /// One-layer encoder over the test vocabulary with randomly initialised weights.
    fn tiny_embedder(dir: &Path, max_tokens: usize) -> BertEmbedder {
        let config_path = dir.join("config.json");
        std::fs::write(
            &config_path,
            format!(
                r#"{{"attention_probs_dropout_prob":0.0,"hidden_act":"gelu","hidden_dropout_prob":0.0,"hidden_size":{HIDDEN},"initializer_range":0.02,"intermediate_size":16,"max_position_embeddings":32,"num_attention_heads":2,"num_hidden_layers":1,"type_vocab_size":2,"vocab_size":8}}"#
            ),
        )
        .unwrap();
        let config = load_config(&config_path).unwrap();
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DTYPE, &device);
        let model = BertModel::load(vb, &config).unwrap();
        let tokenizer = wordpiece_tokenizer(&write_vocab(dir)).unwrap();
        BertEmbedder::from_parts(model, tokenizer, device, max_tokens).unwrap()
    }

    #[test]
    fn embedding_is_mean_of_last_hidden_state() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = tiny_embedder(dir.path(), MAX_TOKENS);
        let text = "lane radar assists";

        let first = embedder.embed(text).unwrap();
        assert_eq!(first.len(), HIDDEN);
        let second = embedder.embed(text).unwrap();
        assert_eq!(
            first.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );

        let ids = Tensor::new(&[2u32, 4, 5, 6, 7, 3], &embedder.device)
            .unwrap()
            .unsqueeze(0)
            .unwrap();
        let hidden = embedder
            .model
            .forward(&ids, &ids.zeros_like().unwrap(), None)
            .unwrap();
        assert_eq!(hidden.dims(), &[1, 6, HIDDEN]);
        let rows = hidden.squeeze(0).unwrap().to_vec2::<f32>().unwrap();
        for (d, value) in first.iter().enumerate() {
            let mean = rows.iter().map(|r| r[d]).sum::<f32>() / rows.len() as f32;
            assert!((value - mean).abs() < 1e-5, "dim {d}: {value} vs {mean}");
        }
    }

    #[test]
    fn long_text_embeds_as_its_truncated_prefix() {
        let dir = tempfile::tempdir().unwrap();
        // [CLS] lane radar [SEP]
        let embedder = tiny_embedder(dir.path(), 4);
        let long = embedder.embed("lane radar assist lane radar assists").unwrap();
        let prefix = embedder.embed("lane radar").unwrap();
        assert_eq!(
            long.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            prefix.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );
        let untruncated = tiny_embedder(dir.path(), MAX_TOKENS);
        assert_eq!(untruncated.embed("lane radar assist").unwrap().len(), HIDDEN);
    }

    #[test]
    fn local_source_without_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path());
        let err = BertEmbedder::load(&ModelSource::Local(dir.path().to_path_buf())).err().unwrap();
        assert!(matches!(err, EmbedError::MissingFile { file: "config.json", .. }));
    }
}
