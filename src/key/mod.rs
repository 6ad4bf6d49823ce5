pub mod deriver;
pub mod path;

pub use deriver::{generate_hash, DerivedKey, KeyDeriver};
pub use path::{DottedPathEvaluator, PathEvaluator};
