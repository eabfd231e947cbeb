//! Deterministic stub collaborators shared by the integration tests.

#![allow(dead_code)]

use engen::{
    AnnotatedToken, CellState, DistanceFeature, EnGen, EnGenConfig, EntityType, OutputHeads,
    RecurrentCell, Result, TokenEmbedding, TokenId,
};

/// Embedding whose values depend only on the token id.
pub struct StubEmbedding {
    pub vocab: usize,
    pub dim: usize,
}

impl TokenEmbedding for StubEmbedding {
    fn dim(&self) -> usize {
        self.dim
    }

    fn vocab_size(&self) -> usize {
        self.vocab
    }

    fn embed(&self, token: TokenId) -> Result<Vec<f32>> {
        if token >= self.vocab {
            return Err(engen::Error::invalid_input(format!("token {token}")));
        }
        Ok((0..self.dim)
            .map(|i| ((token + i) % 7) as f32 / 7.0 - 0.5)
            .collect())
    }
}

/// `h' = tanh(0.5 h + x)`, with `x` cycled to the hidden size.
pub struct StubCell {
    pub input_dim: usize,
    pub hidden_dim: usize,
}

impl RecurrentCell for StubCell {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    fn initial_state(&self) -> CellState {
        CellState::zeros(self.hidden_dim, 0)
    }

    fn step(&self, input: &[f32], state: &CellState) -> Result<CellState> {
        let hidden = (0..self.hidden_dim)
            .map(|k| (0.5 * state.hidden[k] + input[k % input.len()]).tanh())
            .collect();
        Ok(CellState {
            hidden,
            memory: Vec::new(),
        })
    }
}

/// Heads with fixed preferences, so greedy decisions are predictable.
///
/// Entities score `-distance`; the "new" slot scores 0, or 10 with
/// `prefer_new`.
pub struct StubHeads {
    pub types_num: usize,
    pub max_mention_length: usize,
    pub vocab: usize,
    pub prefer_type: Option<usize>,
    pub prefer_token: Option<TokenId>,
    /// Preferred mention length (not index).
    pub prefer_length: Option<usize>,
    pub prefer_new: bool,
}

impl StubHeads {
    pub fn for_config(config: &EnGenConfig) -> Self {
        Self {
            types_num: config.types_num,
            max_mention_length: config.max_mention_length,
            vocab: config.vocab_size,
            prefer_type: None,
            prefer_token: None,
            prefer_length: None,
            prefer_new: false,
        }
    }
}

fn one_hot(n: usize, hot: Option<usize>) -> Vec<f32> {
    (0..n)
        .map(|i| if Some(i) == hot { 5.0 } else { 0.0 })
        .collect()
}

impl OutputHeads for StubHeads {
    fn type_logits(&self, _context: &[f32]) -> Result<Vec<f32>> {
        Ok(one_hot(self.types_num, self.prefer_type))
    }

    fn label_logits(
        &self,
        _context: &[f32],
        entities: &[&[f32]],
        distances: &[f32],
    ) -> Result<Vec<f32>> {
        assert_eq!(entities.len(), distances.len());
        let mut logits: Vec<f32> = distances.iter().map(|d| -d).collect();
        logits.push(if self.prefer_new { 10.0 } else { 0.0 });
        Ok(logits)
    }

    fn length_logits(&self, _context: &[f32]) -> Result<Vec<f32>> {
        let hot = self.prefer_length.and_then(|l| l.checked_sub(1));
        Ok(one_hot(self.max_mention_length, hot))
    }

    fn token_logits(&self, _context: &[f32]) -> Result<Vec<f32>> {
        Ok(one_hot(self.vocab, self.prefer_token))
    }
}

pub const VOCAB: usize = 20;
pub const EOS: TokenId = 0;

pub fn config() -> EnGenConfig {
    EnGenConfig::default()
        .with_vocab_size(VOCAB)
        .with_dims(4, 6, 3)
        .with_types_num(3)
        .with_max_mention_length(4)
        .with_distance_feature(DistanceFeature::Linear)
        .with_special_tokens(EOS, None)
}

/// Model with every collaborator stubbed.
pub fn stub_model(
    config: EnGenConfig,
    prefer_type: Option<usize>,
    prefer_token: Option<TokenId>,
) -> EnGen {
    let heads = StubHeads {
        prefer_type,
        prefer_token,
        ..StubHeads::for_config(&config)
    };
    stub_model_with(config, heads)
}

/// Model with stub embedding and cell around the given heads.
pub fn stub_model_with(config: EnGenConfig, heads: StubHeads) -> EnGen {
    EnGen::builder(config.clone())
        .embedding(StubEmbedding {
            vocab: config.vocab_size,
            dim: config.embedding_dim,
        })
        .cell(StubCell {
            input_dim: config.embedding_dim,
            hidden_dim: config.hidden_dim,
        })
        .heads(heads)
        .build()
        .expect("stub model")
}

pub fn mention(token: TokenId, entity: usize, sentence: usize) -> AnnotatedToken {
    AnnotatedToken::mention(token, EntityType::ENTITY, entity, 1, sentence)
}

pub fn plain(token: TokenId, sentence: usize) -> AnnotatedToken {
    AnnotatedToken::plain(token, sentence)
}

pub fn assert_distribution(probs: &[f32]) {
    assert!(!probs.is_empty());
    assert!(probs.iter().all(|p| p.is_finite() && *p >= 0.0), "{probs:?}");
    let sum: f32 = probs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4, "sum {sum}");
}
