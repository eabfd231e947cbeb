//! Whole-document runs: teacher-forced scoring and generation.
//!
//! Both modes drive the same [`StepController`]; they differ only in where
//! each position's decision comes from. In scoring mode the ground truth
//! supplies it and the heads' distributions are evaluated against the next
//! annotated token. In generation mode the [`Sampler`] picks type, label,
//! mention length and token from the same distributions and feeds them back.
//!
//! The driver owns the hidden states of the current and previous sentence
//! for the document being processed and drops them when the run ends.

use crate::controller::{Decision, EntityRef, StepController, StepOutput};
use crate::document::{validate_tokens, AnnotatedToken, Document};
use crate::error::{Error, Result};
use crate::math::softmax;
use crate::model::EnGen;
use crate::sampling::Sampler;
use crate::types::{EntityType, Label, TokenId};
use serde::{Deserialize, Serialize};
use std::mem;

/// Identifier reported for errors raised while generating.
pub const GENERATION_ID: &str = "<generation>";

/// Heads' distributions at one position, predicting the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPrediction {
    /// Over entity types.
    pub type_probs: Vec<f32>,
    /// Over live entities in label order, then "new entity" last.
    pub label_probs: Vec<f32>,
    /// Over mention lengths; index `i` is length `i + 1`.
    pub length_probs: Vec<f32>,
    /// Over the vocabulary.
    pub token_probs: Vec<f32>,
    /// Recency features the label head saw, in label order.
    pub distances: Vec<f32>,
    /// Negative log-likelihood of the next position, if there is one.
    pub nll: Option<f32>,
    /// True if the next position continues the current mention, in which
    /// case only the token distribution contributes to `nll`.
    pub inside_mention: bool,
}

/// Result of scoring one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Document identifier.
    pub id: String,
    /// One prediction per position.
    pub steps: Vec<StepPrediction>,
    /// Sum of per-step negative log-likelihoods.
    pub nll: f32,
    /// Entities in the bank after the last position.
    pub entities: usize,
}

impl ScoredDocument {
    /// Number of positions that had a next position to predict.
    #[must_use]
    pub fn predicted(&self) -> usize {
        self.steps.iter().filter(|s| s.nll.is_some()).count()
    }

    /// `exp(nll / predicted)`, or 1 for documents shorter than two tokens.
    #[must_use]
    pub fn perplexity(&self) -> f32 {
        match self.predicted() {
            0 => 1.0,
            n => (self.nll / n as f32).exp(),
        }
    }
}

/// One generated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedToken {
    /// Token id.
    pub token: TokenId,
    /// Type in effect.
    pub entity_type: EntityType,
    /// Entity in effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    /// Sentence index.
    pub sentence: usize,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The end-of-sequence token was chosen.
    EndOfSequence,
    /// The step cap was reached.
    MaxSteps,
}

/// Result of a generation run. The prefix and the end-of-sequence token are
/// not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generated {
    /// Newly generated positions.
    pub tokens: Vec<GeneratedToken>,
    /// Why the run ended.
    pub finish_reason: FinishReason,
    /// Entities in the bank at the end (prefix entities included).
    pub entities: usize,
}

impl Generated {
    /// Token ids only.
    #[must_use]
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.tokens.iter().map(|t| t.token).collect()
    }
}

/// Hidden states of the current and the previous sentence.
#[derive(Debug, Default)]
struct SentenceBuffers {
    sentence: Option<usize>,
    current: Vec<Vec<f32>>,
    previous: Vec<Vec<f32>>,
}

impl SentenceBuffers {
    fn enter(&mut self, sentence: usize) {
        match self.sentence {
            Some(s) if s == sentence => {}
            Some(_) => {
                self.previous = mem::take(&mut self.current);
                self.sentence = Some(sentence);
            }
            None => self.sentence = Some(sentence),
        }
    }

    fn previous(&self) -> &[Vec<f32>] {
        &self.previous
    }

    fn push(&mut self, hidden: Vec<f32>) {
        self.current.push(hidden);
    }
}

/// Raw head outputs for one position.
struct Logits {
    types: Vec<f32>,
    labels: Vec<f32>,
    lengths: Vec<f32>,
    tokens: Vec<f32>,
    distances: Vec<f32>,
}

/// Runs the step protocol over whole sequences.
#[derive(Debug)]
pub struct SequenceDriver<'m> {
    model: &'m EnGen,
    sampler: Sampler,
}

impl<'m> SequenceDriver<'m> {
    /// Driver with a greedy sampler.
    #[must_use]
    pub fn new(model: &'m EnGen) -> Self {
        Self {
            model,
            sampler: Sampler::greedy(),
        }
    }

    /// Use a different sampler for generation.
    #[must_use]
    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Score a document with teacher forcing.
    ///
    /// # Errors
    ///
    /// Any failure, wrapped in [`Error::Document`] with the document id and
    /// the position it occurred at.
    pub fn score(&self, document: &Document) -> Result<ScoredDocument> {
        document.validate_for(self.model.config().types_num)?;
        log::debug!(
            "[driver] scoring {} ({} tokens)",
            document.id,
            document.len()
        );
        let mut controller = StepController::new(self.model);
        let mut buffers = SentenceBuffers::default();
        let mut steps = Vec::with_capacity(document.len());
        let mut total = 0.0;

        for (step, token) in document.tokens.iter().enumerate() {
            let next = document.tokens.get(step + 1);
            let prediction = self
                .score_step(&mut controller, &mut buffers, token, next)
                .map_err(|e| e.in_document(&document.id, step))?;
            total += prediction.nll.unwrap_or(0.0);
            steps.push(prediction);
        }

        let entities = controller.bank().len();
        log::debug!(
            "[driver] scored {}: nll={:.4} entities={}",
            document.id,
            total,
            entities
        );
        Ok(ScoredDocument {
            id: document.id.clone(),
            steps,
            nll: total,
            entities,
        })
    }

    /// Score independent documents. Each gets its own bank; with the
    /// `parallel` feature they run on the rayon pool.
    pub fn score_batch(&self, documents: &[Document]) -> Vec<Result<ScoredDocument>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let model = self.model;
            documents
                .par_iter()
                .map(|doc| SequenceDriver::new(model).score(doc))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            documents.iter().map(|doc| self.score(doc)).collect()
        }
    }

    fn score_step(
        &self,
        controller: &mut StepController<'_>,
        buffers: &mut SentenceBuffers,
        token: &AnnotatedToken,
        next: Option<&AnnotatedToken>,
    ) -> Result<StepPrediction> {
        buffers.enter(token.sentence);
        let out = controller.step(
            token.token,
            &Decision::from_token(token),
            token.sentence,
            buffers.previous(),
        )?;
        buffers.push(out.hidden);

        let next_sentence = next.map_or(token.sentence, |n| n.sentence);
        let logits = self.predict(controller, &out.context, next_sentence)?;
        let prediction = StepPrediction {
            type_probs: softmax(&logits.types),
            label_probs: softmax(&logits.labels),
            length_probs: softmax(&logits.lengths),
            token_probs: softmax(&logits.tokens),
            distances: logits.distances,
            nll: None,
            inside_mention: controller.inside_mention(),
        };
        let nll = match next {
            Some(n) => Some(self.target_nll(controller, &prediction, n)?),
            None => None,
        };
        Ok(StepPrediction { nll, ..prediction })
    }

    /// Run the heads on a context and check their output sizes.
    fn predict(
        &self,
        controller: &StepController<'_>,
        context: &[f32],
        next_sentence: usize,
    ) -> Result<Logits> {
        let config = self.model.config();
        let heads = self.model.heads();
        let bank = controller.bank();
        let distances = bank.distance_vector(next_sentence);

        let types = heads.type_logits(context)?;
        check_len("type logits", config.types_num, types.len())?;
        let labels = heads.label_logits(context, &bank.states(), &distances)?;
        check_len("label logits", bank.len() + 1, labels.len())?;
        let lengths = heads.length_logits(context)?;
        check_len("length logits", config.max_mention_length, lengths.len())?;
        let tokens = heads.token_logits(context)?;
        check_len("token logits", config.vocab_size, tokens.len())?;

        Ok(Logits {
            types,
            labels,
            lengths,
            tokens,
            distances,
        })
    }

    fn target_nll(
        &self,
        controller: &StepController<'_>,
        prediction: &StepPrediction,
        next: &AnnotatedToken,
    ) -> Result<f32> {
        let token_p = prediction.token_probs.get(next.token).ok_or_else(|| {
            Error::invalid_input(format!(
                "token {} outside vocabulary of {}",
                next.token,
                prediction.token_probs.len()
            ))
        })?;
        let mut nll = neg_log(*token_p);
        if prediction.inside_mention {
            return Ok(nll);
        }

        let type_index = next.entity_type.index();
        let type_p = prediction
            .type_probs
            .get(type_index)
            .ok_or_else(|| Error::invalid_type(type_index, prediction.type_probs.len()))?;
        nll += neg_log(*type_p);
        if !next.entity_type.is_entity() {
            return Ok(nll);
        }

        let external = next.entity.ok_or_else(|| {
            Error::invalid_input(format!("{} token without an entity index", next.entity_type))
        })?;
        let bank = controller.bank();
        let label_index = bank.try_resolve(external).map_or(bank.len(), Label::index);
        nll += neg_log(prediction.label_probs[label_index]);

        let length_p = next
            .mention_length
            .checked_sub(1)
            .and_then(|i| prediction.length_probs.get(i))
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "mention length {} outside 1..={}",
                    next.mention_length,
                    prediction.length_probs.len()
                ))
            })?;
        Ok(nll + neg_log(*length_p))
    }

    /// Generate after an optional prefix.
    ///
    /// The prefix is run teacher-forced first, creating and updating its
    /// entities. Without a prefix the end-of-sequence token is fed as a start
    /// symbol. Generation stops when the end-of-sequence token is chosen or
    /// after `max_steps` tokens.
    ///
    /// # Errors
    ///
    /// Any failure, wrapped in [`Error::Document`] with
    /// [`GENERATION_ID`] and the position (prefix positions first).
    pub fn generate(
        &mut self,
        prefix: &[AnnotatedToken],
        max_steps: usize,
    ) -> Result<Generated> {
        let model = self.model;
        let config = model.config();
        let eos = config.end_of_sequence_token;
        let start = [AnnotatedToken::plain(eos, 0)];
        let warmup: &[AnnotatedToken] = if prefix.is_empty() { &start } else { prefix };
        validate_tokens(GENERATION_ID, prefix, Some(config.types_num))?;

        let mut controller = StepController::new(model);
        let mut buffers = SentenceBuffers::default();
        let mut last: Option<(StepOutput, AnnotatedToken)> = None;
        for (step, token) in warmup.iter().enumerate() {
            buffers.enter(token.sentence);
            let out = controller
                .step(
                    token.token,
                    &Decision::from_token(token),
                    token.sentence,
                    buffers.previous(),
                )
                .map_err(|e| e.in_document(GENERATION_ID, step))?;
            buffers.push(out.hidden.clone());
            last = Some((out, *token));
        }
        let Some((mut out, last_token)) = last else {
            return Err(Error::invalid_input("empty warm-up").in_document(GENERATION_ID, 0));
        };
        let mut sentence = last_token.sentence;
        let mut current = last_token.token;

        let mut tokens = Vec::with_capacity(max_steps.min(1024));
        let mut finish_reason = FinishReason::MaxSteps;
        for produced in 0..max_steps {
            let position = prefix.len() + produced;
            let next_sentence = if config.sentence_end_token == Some(current) {
                sentence + 1
            } else {
                sentence
            };
            let chosen = self
                .choose(&controller, &out.context, next_sentence)
                .map_err(|e| e.in_document(GENERATION_ID, position))?;
            let (token, decision) = chosen;
            if token == eos {
                finish_reason = FinishReason::EndOfSequence;
                break;
            }

            buffers.enter(next_sentence);
            out = controller
                .step(token, &decision, next_sentence, buffers.previous())
                .map_err(|e| e.in_document(GENERATION_ID, position))?;
            buffers.push(out.hidden.clone());
            tokens.push(GeneratedToken {
                token,
                entity_type: out.entity_type,
                label: out.label,
                sentence: next_sentence,
            });
            sentence = next_sentence;
            current = token;
        }

        let entities = controller.bank().len();
        log::info!(
            "[driver] generated {} tokens ({:?}), {} entities",
            tokens.len(),
            finish_reason,
            entities
        );
        Ok(Generated {
            tokens,
            finish_reason,
            entities,
        })
    }

    /// Pick the next token and its entity decision.
    fn choose(
        &mut self,
        controller: &StepController<'_>,
        context: &[f32],
        next_sentence: usize,
    ) -> Result<(TokenId, Decision)> {
        let logits = self.predict(controller, context, next_sentence)?;
        let decision = if controller.inside_mention() {
            Decision::none()
        } else {
            let entity_type = EntityType(self.sampler.pick(&logits.types)?);
            if entity_type.is_entity() {
                let pick = self.sampler.pick(&logits.labels)?;
                let entity = if pick == controller.bank().len() {
                    EntityRef::New
                } else {
                    EntityRef::Existing(Label(pick))
                };
                let mention_length = self.sampler.pick(&logits.lengths)? + 1;
                Decision::mention(entity_type, entity, mention_length)
            } else {
                Decision::none()
            }
        };
        let token = self.sampler.pick(&logits.tokens)?;
        Ok((token, decision))
    }
}

fn check_len(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::dimension_mismatch(what, expected, actual))
    }
}

fn neg_log(p: f32) -> f32 {
    -p.max(f32::MIN_POSITIVE).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnGenConfig;

    fn model() -> EnGen {
        EnGen::new(
            EnGenConfig::default()
                .with_vocab_size(16)
                .with_dims(4, 6, 3)
                .with_types_num(3)
                .with_max_mention_length(3),
        )
        .unwrap()
    }

    fn doc() -> Document {
        Document::new(
            "d",
            vec![
                AnnotatedToken::mention(3, EntityType::ENTITY, 0, 2, 0),
                AnnotatedToken::plain(4, 0),
                AnnotatedToken::plain(5, 0),
                AnnotatedToken::mention(6, EntityType(2), 1, 1, 1),
                AnnotatedToken::mention(3, EntityType::ENTITY, 0, 1, 1),
            ],
        )
    }

    #[test]
    fn test_sentence_buffers_rotate() {
        let mut b = SentenceBuffers::default();
        b.enter(0);
        b.push(vec![1.0]);
        b.enter(0);
        b.push(vec![2.0]);
        assert!(b.previous().is_empty());
        b.enter(1);
        assert_eq!(b.previous().len(), 2);
        b.push(vec![3.0]);
        b.enter(4);
        assert_eq!(b.previous(), &[vec![3.0]]);
    }

    #[test]
    fn test_score_shapes() {
        let m = model();
        let scored = m.score(&doc()).unwrap();
        assert_eq!(scored.steps.len(), 5);
        assert_eq!(scored.entities, 2);
        assert_eq!(scored.predicted(), 4);
        assert!(scored.steps[0].inside_mention);
        assert!(!scored.steps[1].inside_mention);
        assert!(scored.steps[4].nll.is_none());
        // Before the second entity exists the label head sees one entity.
        assert_eq!(scored.steps[2].label_probs.len(), 2);
        assert_eq!(scored.steps[3].label_probs.len(), 3);
        assert!(scored.nll.is_finite() && scored.nll > 0.0);
        assert!(scored.perplexity() >= 1.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let m = model();
        assert_eq!(m.score(&doc()).unwrap(), m.score(&doc()).unwrap());
    }

    #[test]
    fn test_score_error_carries_location() {
        let m = model();
        let mut d = doc();
        d.tokens[3].mention_length = 9;
        match m.score(&d) {
            Err(Error::Document {
                document_id, step, ..
            }) => {
                assert_eq!(document_id, "d");
                // Caught when step 2 evaluates position 3.
                assert_eq!(step, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_generate_respects_cap() {
        let m = model();
        let g = m.generate(&[], 7).unwrap();
        assert!(g.tokens.len() <= 7);
        if g.tokens.len() < 7 {
            assert_eq!(g.finish_reason, FinishReason::EndOfSequence);
        }
        assert!(g.tokens.iter().all(|t| t.token != 0));
    }

    #[test]
    fn test_generate_zero_steps() {
        let g = model().generate(&doc().tokens, 0).unwrap();
        assert!(g.tokens.is_empty());
        assert_eq!(g.finish_reason, FinishReason::MaxSteps);
        assert_eq!(g.entities, 2);
    }

    #[test]
    fn test_batch_matches_single() {
        let m = model();
        let docs = vec![doc(), Document::new("e", vec![AnnotatedToken::plain(1, 0)])];
        let batch = m.score_batch(&docs);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].as_ref().unwrap(), &m.score(&docs[0]).unwrap());
        assert_eq!(batch[1].as_ref().unwrap().steps.len(), 1);
    }
}
