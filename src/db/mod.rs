mod repository;
mod schema;

pub use repository::{Repository, DATETIME_FORMAT};
