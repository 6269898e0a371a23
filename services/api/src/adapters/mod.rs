pub mod db;
pub mod jwt;
pub mod store;

pub use db::DbAdapter;
pub use jwt::JwtTokenAdapter;
pub use store::{Store, StoreError};
