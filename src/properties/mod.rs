pub mod layer;
pub mod loader;
pub mod stack;

pub use layer::{canonical_key, env_candidate, LayerKind, PropertyLayer};
pub use loader::{environment_layer, file_layer, load_standard_stack, StandardRank};
pub use stack::PropertySourceStack;
