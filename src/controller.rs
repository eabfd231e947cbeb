//! Per-token step protocol.
//!
//! Each position runs the same sequence:
//!
//! 1. advance the recurrent cell on the token embedding, giving `h_t`
//! 2. apply the entity decision for this position against the bank
//! 3. pool the previous sentence with `h_t` as the query
//! 4. compose `h_t`, the summary and the entity vector into the context
//!
//! The context is what the prediction heads read to score the *next*
//! position.
//!
//! Decisions map onto three states:
//!
//! | Decision | State | Bank |
//! |----------|-------|------|
//! | non-entity type | [`StepState::NoEntity`] | untouched |
//! | entity not yet in the bank | [`StepState::NewEntity`] | `create` |
//! | entity already in the bank | [`StepState::ContinueEntity`] | `update` with `h_t` |
//!
//! A mention longer than one token keeps the controller inside it: the
//! following `mention_length - 1` positions reuse the mention's entity
//! (and update it) without reading a new decision.

use crate::backends::CellState;
use crate::document::AnnotatedToken;
use crate::entity::EntityState;
use crate::error::{ensure_dim, Error, Result};
use crate::memory::EntityBank;
use crate::model::EnGen;
use crate::types::{EntityType, Label, TokenId};
use serde::{Deserialize, Serialize};

/// What happened to the entity memory at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// A new entity was allocated.
    NewEntity,
    /// An existing entity was referenced and updated.
    ContinueEntity,
    /// No entity at this position.
    NoEntity,
}

/// How a decision names its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    /// An index from the input stream. Created on first sight.
    External(usize),
    /// An entity already in the bank. Missing labels are an error.
    Existing(Label),
    /// A brand-new entity under a fresh external index.
    New,
}

/// The entity decision for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Entity type (0 for non-entity).
    pub entity_type: EntityType,
    /// Referenced entity; required for entity types.
    pub entity: Option<EntityRef>,
    /// Length of the mention starting here.
    pub mention_length: usize,
}

impl Decision {
    /// No entity.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            entity_type: EntityType::NON_ENTITY,
            entity: None,
            mention_length: 1,
        }
    }

    /// A mention of `entity` starting here.
    #[must_use]
    pub const fn mention(entity_type: EntityType, entity: EntityRef, mention_length: usize) -> Self {
        Self {
            entity_type,
            entity: Some(entity),
            mention_length,
        }
    }

    /// The ground-truth decision carried by an annotated token.
    #[must_use]
    pub fn from_token(token: &AnnotatedToken) -> Self {
        if token.entity_type.is_entity() {
            Self {
                entity_type: token.entity_type,
                entity: token.entity.map(EntityRef::External),
                mention_length: token.mention_length,
            }
        } else {
            Self {
                entity_type: token.entity_type,
                ..Self::none()
            }
        }
    }
}

/// A mention still being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveMention {
    /// Entity the mention refers to.
    pub label: Label,
    /// Its type.
    pub entity_type: EntityType,
    /// Positions left in the mention after the current one.
    pub remaining: usize,
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Memory transition at this position.
    pub state: StepState,
    /// Type in effect at this position.
    pub entity_type: EntityType,
    /// Entity in effect at this position.
    pub label: Option<Label>,
    /// True if the position continued a longer mention.
    pub inside_mention: bool,
    /// Decoder hidden state `h_t`.
    pub hidden: Vec<f32>,
    /// Composed context for the prediction heads.
    pub context: Vec<f32>,
}

/// Document-scoped controller. Owns the entity bank and the recurrent state.
#[derive(Debug)]
pub struct StepController<'m> {
    model: &'m EnGen,
    bank: EntityBank,
    cell_state: CellState,
    active: Option<ActiveMention>,
    sentence: usize,
}

impl<'m> StepController<'m> {
    /// Fresh controller: empty bank, initial cell state.
    #[must_use]
    pub fn new(model: &'m EnGen) -> Self {
        Self {
            model,
            bank: model.new_bank(),
            cell_state: model.cell().initial_state(),
            active: None,
            sentence: 0,
        }
    }

    /// Forget everything; called between documents.
    pub fn reset(&mut self) {
        self.bank.reset();
        self.cell_state = self.model.cell().initial_state();
        self.active = None;
        self.sentence = 0;
    }

    /// The entity bank.
    #[must_use]
    pub fn bank(&self) -> &EntityBank {
        &self.bank
    }

    /// The mention being read, if any.
    #[must_use]
    pub fn active(&self) -> Option<&ActiveMention> {
        self.active.as_ref()
    }

    /// True if the next position belongs to the current mention.
    #[must_use]
    pub fn inside_mention(&self) -> bool {
        self.active.is_some_and(|m| m.remaining > 0)
    }

    /// Current sentence index.
    #[must_use]
    pub const fn sentence(&self) -> usize {
        self.sentence
    }

    /// Run one position.
    ///
    /// `previous` holds the hidden states of the previous sentence. The
    /// decision is ignored while inside a mention.
    ///
    /// # Errors
    ///
    /// - `InvalidType` for a type outside the configured set
    /// - `UnknownEntity` for an [`EntityRef::Existing`] label not in the bank
    /// - `InvalidInput` for a decreasing sentence index, a mention length
    ///   outside `1..=max_mention_length` or an entity type without entity
    /// - `DimensionMismatch` when a collaborator returns the wrong size
    pub fn step(
        &mut self,
        token: TokenId,
        decision: &Decision,
        sentence: usize,
        previous: &[Vec<f32>],
    ) -> Result<StepOutput> {
        if sentence < self.sentence {
            return Err(Error::invalid_input(format!(
                "sentence index decreased from {} to {sentence}",
                self.sentence
            )));
        }
        self.check_decision(decision)?;
        let model = self.model;
        let x = model.embedding().embed(token)?;
        let next = model.cell().step(&x, &self.cell_state)?;
        ensure_dim("hidden state", model.config().hidden_dim, next.hidden.len())?;
        self.cell_state = next;
        self.sentence = sentence;
        let hidden = self.cell_state.hidden.clone();

        let (state, entity_type, label, inside_mention) = self.decide(&hidden, decision)?;

        let entity = match label {
            Some(l) => Some(self.bank.get(l).map(EntityState::state)?),
            None => None,
        };
        let summary = model.composer().summarize(previous, &hidden)?;
        let context = model.composer().compose(&hidden, &summary, entity)?;

        Ok(StepOutput {
            state,
            entity_type,
            label,
            inside_mention,
            hidden,
            context,
        })
    }

    /// Reject a decision before any state moves. Decisions made inside a
    /// mention are ignored and never rejected.
    fn check_decision(&self, decision: &Decision) -> Result<()> {
        if self.inside_mention() {
            return Ok(());
        }
        let entity_type = decision.entity_type;
        self.bank.check_type(entity_type)?;
        if !entity_type.is_entity() {
            return Ok(());
        }
        let max = self.model.config().max_mention_length;
        if decision.mention_length == 0 || decision.mention_length > max {
            return Err(Error::invalid_input(format!(
                "mention length {} outside 1..={max}",
                decision.mention_length
            )));
        }
        match decision.entity {
            None => Err(Error::invalid_input(format!(
                "{entity_type} decision without an entity"
            ))),
            Some(EntityRef::Existing(label)) if !self.bank.contains(label) => {
                Err(Error::unknown_entity(format!(
                    "label {label} not in bank ({} entities)",
                    self.bank.len()
                )))
            }
            Some(_) => Ok(()),
        }
    }

    fn decide(
        &mut self,
        h_t: &[f32],
        decision: &Decision,
    ) -> Result<(StepState, EntityType, Option<Label>, bool)> {
        let model = self.model;
        let params = model.params();
        let sentence = self.sentence;

        if let Some(active) = self.active.as_mut().filter(|m| m.remaining > 0) {
            active.remaining -= 1;
            let (label, entity_type) = (active.label, active.entity_type);
            self.bank
                .update(label, h_t, params.w_h(), params.w_delta(), sentence)?;
            return Ok((StepState::ContinueEntity, entity_type, Some(label), true));
        }
        self.active = None;

        let entity_type = decision.entity_type;
        if !entity_type.is_entity() {
            return Ok((StepState::NoEntity, entity_type, None, false));
        }
        let reference = decision.entity.ok_or_else(|| {
            Error::invalid_input(format!("{entity_type} decision without an entity"))
        })?;
        let base = params.base_embedding(entity_type)?;

        let (state, label) = match reference {
            EntityRef::External(index) => match self.bank.try_resolve(index) {
                Some(label) => (StepState::ContinueEntity, label),
                None => (
                    StepState::NewEntity,
                    self.bank.create(entity_type, base, sentence, index)?,
                ),
            },
            EntityRef::Existing(label) => (StepState::ContinueEntity, label),
            EntityRef::New => (
                StepState::NewEntity,
                self.bank.create_fresh(entity_type, base, sentence)?,
            ),
        };
        if state == StepState::ContinueEntity {
            self.bank
                .update(label, h_t, params.w_h(), params.w_delta(), sentence)?;
        }

        self.active = Some(ActiveMention {
            label,
            entity_type,
            remaining: decision.mention_length - 1,
        });
        Ok((state, entity_type, Some(label), false))
    }
}
