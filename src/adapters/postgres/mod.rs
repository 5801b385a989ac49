//! PostgreSQL adapters.
//!
//! - `Database` - Background pool bootstrap with an observable status

mod bootstrap;

pub use bootstrap::{connect, Database, DatabaseError, DatabaseStatus};
