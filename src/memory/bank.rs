//! The per-document entity arena.

use super::distance::distance_value;
use super::update::{update_rule, EntityUpdate};
use crate::config::{DistanceFeature, EnGenConfig};
use crate::entity::EntityState;
use crate::error::{ensure_dim, Error, Result};
use crate::math::Matrix;
use crate::types::{EntityType, Label};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Dynamic collection of entity states for one document.
///
/// Entities live in an arena indexed by their dense [`Label`]; a separate map
/// translates external entity indices (as they appear in the input stream)
/// to labels. The bank only grows while a document is processed and is
/// emptied with [`EntityBank::reset`] before the next one.
#[derive(Clone)]
pub struct EntityBank {
    entity_dim: usize,
    types_num: usize,
    distance: DistanceFeature,
    rule: Arc<dyn EntityUpdate>,
    entities: Vec<EntityState>,
    etoi: HashMap<usize, Label>,
    next_external: usize,
}

impl std::fmt::Debug for EntityBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityBank")
            .field("entity_dim", &self.entity_dim)
            .field("types_num", &self.types_num)
            .field("distance", &self.distance)
            .field("rule", &self.rule.name())
            .field("entities", &self.entities.len())
            .finish()
    }
}

impl EntityBank {
    /// Empty bank using the default update rule.
    #[must_use]
    pub fn new(entity_dim: usize, types_num: usize, distance: DistanceFeature) -> Self {
        Self {
            entity_dim,
            types_num,
            distance,
            rule: Arc::from(update_rule(Default::default())),
            entities: Vec::new(),
            etoi: HashMap::new(),
            next_external: 0,
        }
    }

    /// Empty bank configured from a model configuration.
    #[must_use]
    pub fn from_config(config: &EnGenConfig) -> Self {
        Self::new(config.entity_dim, config.types_num, config.distance_feature)
            .with_rule(Arc::from(update_rule(config.update_rule)))
    }

    /// Use a specific update rule.
    #[must_use]
    pub fn with_rule(mut self, rule: Arc<dyn EntityUpdate>) -> Self {
        self.rule = rule;
        self
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True before the first entity is created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity state dimension.
    #[must_use]
    pub const fn entity_dim(&self) -> usize {
        self.entity_dim
    }

    /// Forget every entity. Called at each document boundary.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.etoi.clear();
        self.next_external = 0;
    }

    /// Check that `entity_type` is an entity type of the configured set.
    pub fn check_type(&self, entity_type: EntityType) -> Result<()> {
        if entity_type.index() >= self.types_num {
            return Err(Error::invalid_type(entity_type.index(), self.types_num));
        }
        Ok(())
    }

    /// Allocate a new entity for `external_index`.
    ///
    /// The state starts as a copy of the type's base embedding and
    /// `last_sentence` is set to `sentence`.
    ///
    /// # Errors
    ///
    /// - `InvalidType` if the type is outside the configured set
    /// - `InvalidInput` for the non-entity type or an already mapped index
    /// - `DimensionMismatch` if the base embedding has the wrong size
    pub fn create(
        &mut self,
        entity_type: EntityType,
        base_embedding: &[f32],
        sentence: usize,
        external_index: usize,
    ) -> Result<Label> {
        self.check_type(entity_type)?;
        if !entity_type.is_entity() {
            return Err(Error::invalid_input(
                "cannot create an entity of the non-entity type",
            ));
        }
        if let Some(existing) = self.etoi.get(&external_index) {
            return Err(Error::invalid_input(format!(
                "external entity {external_index} already mapped to {existing}"
            )));
        }
        ensure_dim("base embedding", self.entity_dim, base_embedding.len())?;

        let label = Label(self.entities.len());
        self.entities.push(EntityState::new(
            label,
            entity_type,
            external_index,
            base_embedding.to_vec(),
            sentence,
        ));
        self.etoi.insert(external_index, label);
        self.next_external = self.next_external.max(external_index.saturating_add(1));
        log::debug!(
            "[bank] created {} ({}) for external {} in sentence {}",
            label,
            entity_type,
            external_index,
            sentence
        );
        Ok(label)
    }

    /// Allocate a new entity under a fresh external index.
    ///
    /// Used when the model itself introduces an entity during generation.
    pub fn create_fresh(
        &mut self,
        entity_type: EntityType,
        base_embedding: &[f32],
        sentence: usize,
    ) -> Result<Label> {
        let external = self.next_external;
        self.create(entity_type, base_embedding, sentence, external)
    }

    /// Blend the hidden state into an existing entity's memory.
    ///
    /// Only the addressed entity changes; `last_sentence` moves to `sentence`.
    ///
    /// # Errors
    ///
    /// - `UnknownEntity` if `label` was never created
    /// - `InvalidInput` if `sentence` precedes the entity's last mention
    /// - `DimensionMismatch` for wrongly shaped inputs
    pub fn update(
        &mut self,
        label: Label,
        h_t: &[f32],
        w_h: &Matrix,
        w_delta: &Matrix,
        sentence: usize,
    ) -> Result<&[f32]> {
        let rule = Arc::clone(&self.rule);
        let entity = self
            .entities
            .get_mut(label.index())
            .ok_or_else(|| Error::unknown_entity(format!("label {label} not in bank")))?;
        if sentence < entity.last_sentence() {
            return Err(Error::invalid_input(format!(
                "entity {label} last mentioned in sentence {}, update in earlier sentence {sentence}",
                entity.last_sentence()
            )));
        }

        let next = rule.blend(entity.state(), h_t, w_h, w_delta)?;
        ensure_dim("updated entity state", entity.dim(), next.len())?;
        entity.set_state(next, sentence);
        Ok(entity.state())
    }

    /// Recency feature for every live entity at `sentence`, keyed by label.
    #[must_use]
    pub fn distance_features(&self, sentence: usize) -> BTreeMap<Label, f32> {
        self.entities
            .iter()
            .map(|e| (e.label(), distance_value(self.distance, e.gap(sentence))))
            .collect()
    }

    /// Recency features in label order.
    #[must_use]
    pub fn distance_vector(&self, sentence: usize) -> Vec<f32> {
        self.entities
            .iter()
            .map(|e| distance_value(self.distance, e.gap(sentence)))
            .collect()
    }

    /// Label for an external entity index.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` if the index has not been seen in this document.
    pub fn resolve(&self, external_index: usize) -> Result<Label> {
        self.try_resolve(external_index).ok_or_else(|| {
            Error::unknown_entity(format!("external entity {external_index} not in bank"))
        })
    }

    /// Label for an external entity index, if any.
    #[must_use]
    pub fn try_resolve(&self, external_index: usize) -> Option<Label> {
        self.etoi.get(&external_index).copied()
    }

    /// External index of a label; the inverse of [`resolve`](Self::resolve).
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for a label not in the bank.
    pub fn label_of(&self, label: Label) -> Result<usize> {
        self.get(label).map(EntityState::external_index)
    }

    /// Borrow an entity.
    pub fn get(&self, label: Label) -> Result<&EntityState> {
        self.entities
            .get(label.index())
            .ok_or_else(|| Error::unknown_entity(format!("label {label} not in bank")))
    }

    /// Does the bank hold this label?
    #[must_use]
    pub fn contains(&self, label: Label) -> bool {
        label.index() < self.entities.len()
    }

    /// Entities in label order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.iter()
    }

    /// State vectors in label order.
    #[must_use]
    pub fn states(&self) -> Vec<&[f32]> {
        self.entities.iter().map(EntityState::state).collect()
    }
}
