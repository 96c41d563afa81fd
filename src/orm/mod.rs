//! Minimal object-relational mapping: declared schemas, resolved metadata, active records over a pool.

pub mod builder;
pub mod field;
pub mod model;
pub mod params;
pub mod pool;
pub mod record;
pub mod schema;

pub use builder::{FindAll, Limit};
pub use field::{Field, FieldDefault};
pub use model::Model;
pub use pool::Pool;
pub use record::Record;
pub use schema::{resolve, ModelMeta, ModelSchema};
