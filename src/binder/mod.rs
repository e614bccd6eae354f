pub mod bind;
pub mod schema;
pub mod value;

pub use bind::{bind, BindingError};
pub use schema::{ConfigField, ConfigSchema, FieldKind};
pub use value::{BoundConfig, PropertyValue};
