//! State machine with domain indexing
//!
//! Holds the current state of every entity. Integrations read their inputs
//! from here (the sun entity) and publish their own entities into it.

use dashmap::DashMap;
use tracing::{debug, instrument, trace};
use wb_core::{slugify, Attributes, EntityId, EntityIdError, State};

/// Concurrent store of entity states
#[derive(Default)]
pub struct StateMachine {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Entity ids per domain
    domain_index: DashMap<String, Vec<String>>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of an entity
    ///
    /// `last_changed` only moves when the state value differs from the
    /// stored one.
    #[instrument(skip(self, state, attributes), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
    ) -> State {
        let key = entity_id.to_string();
        let domain = entity_id.domain().to_string();

        let old_state = self.states.get(&key).map(|s| s.clone());
        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes),
            None => State::new(entity_id, state, attributes),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map_or(true, |s| s.state != new_state.state),
            "Setting entity state"
        );

        self.states.insert(key.clone(), new_state.clone());

        if old_state.is_none() {
            self.domain_index.entry(domain).or_default().push(key);
        }

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value only
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(domain)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn domain_states(&self, domain: &str) -> Vec<State> {
        self.entity_ids(domain)
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Remove an entity's state
    #[instrument(skip(self), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId) -> Option<State> {
        let key = entity_id.to_string();
        let old_state = self.states.remove(&key).map(|(_, s)| s);

        if old_state.is_some() {
            trace!("Removing entity state");
            if let Some(mut ids) = self.domain_index.get_mut(entity_id.domain()) {
                ids.retain(|id| id != &key);
            }
        }

        old_state
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }

    /// Entity id for `name` in `domain` that no current state uses
    ///
    /// A taken id gets `_2`, `_3`, ... appended until a free one is found.
    pub fn generate_entity_id(&self, domain: &str, name: &str) -> Result<EntityId, EntityIdError> {
        let object_id = slugify(name);
        let preferred = EntityId::new(domain, object_id.as_str())?;
        if !self.states.contains_key(&preferred.to_string()) {
            return Ok(preferred);
        }

        let mut tries = 2;
        loop {
            let candidate = EntityId::new(domain, format!("{}_{}", object_id, tries))?;
            if !self.states.contains_key(&candidate.to_string()) {
                return Ok(candidate);
            }
            tries += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    #[test]
    fn test_set_and_get_state() {
        let sm = StateMachine::new();
        let attrs = Attributes::from([("azimuth".to_string(), json!(143.2))]);

        let state = sm.set(id("sun.sun"), "above_horizon", attrs.clone());
        assert_eq!(state.state, "above_horizon");

        let fetched = sm.get("sun.sun").unwrap();
        assert_eq!(fetched.attributes, attrs);
        assert_eq!(sm.get_state("sun.sun").as_deref(), Some("above_horizon"));
        assert!(sm.get("sun.moon").is_none());
    }

    #[test]
    fn test_update_preserves_last_changed() {
        let sm = StateMachine::new();
        let first = sm.set(id("sensor.office"), "12.5", Attributes::new());
        let second = sm.set(id("sensor.office"), "12.5", Attributes::new());
        assert_eq!(first.last_changed, second.last_changed);
        assert_eq!(sm.entity_count(), 1);
    }

    #[test]
    fn test_domain_index() {
        let sm = StateMachine::new();
        sm.set(id("sensor.office"), "0", Attributes::new());
        sm.set(id("sensor.attic"), "50", Attributes::new());
        sm.set(id("sun.sun"), "below_horizon", Attributes::new());

        let mut sensors = sm.entity_ids("sensor");
        sensors.sort();
        assert_eq!(sensors, vec!["sensor.attic", "sensor.office"]);
        assert_eq!(sm.domain_states("sun").len(), 1);
        assert!(sm.entity_ids("light").is_empty());
    }

    #[test]
    fn test_remove() {
        let sm = StateMachine::new();
        sm.set(id("sensor.office"), "0", Attributes::new());

        let removed = sm.remove(&id("sensor.office"));
        assert!(removed.is_some());
        assert!(sm.get("sensor.office").is_none());
        assert!(sm.entity_ids("sensor").is_empty());
        assert!(sm.remove(&id("sensor.office")).is_none());
    }

    #[test]
    fn test_generate_entity_id() {
        let sm = StateMachine::new();
        let first = sm.generate_entity_id("sensor", "Living Room").unwrap();
        assert_eq!(first.to_string(), "sensor.living_room");

        sm.set(first, "0", Attributes::new());
        sm.set(id("sensor.living_room_2"), "0", Attributes::new());
        let next = sm.generate_entity_id("sensor", "Living Room").unwrap();
        assert_eq!(next.to_string(), "sensor.living_room_3");

        assert!(sm.generate_entity_id("Bad Domain", "x").is_err());
    }
}
