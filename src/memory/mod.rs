//! Entity memory: the arena of entity states, their update rules, and
//! recency features.
//!
//! ```text
//!   create(type, base, sent)        update(label, h_t, W_h, W_δ)
//!            │                               │
//!            ▼                               ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │ EntityBank                                       │
//!   │   entities: [EntityState; n]   (indexed by Label)│
//!   │   etoi:     external index → Label               │
//!   └──────────────────────────────────────────────────┘
//!            │
//!            ▼
//!   distance_features(sent) → { Label → f(sent - last_sentence) }
//! ```

mod bank;
pub mod distance;
pub mod update;

pub use bank::EntityBank;
pub use distance::distance_value;
pub use update::{update_rule, BilinearNormalized, EntityUpdate, GatedInterpolation};
