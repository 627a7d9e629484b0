//! Query layer, one zero-sized repo per table.

mod user_repo;

pub use user_repo::UserRepo;
