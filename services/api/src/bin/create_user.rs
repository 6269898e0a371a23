//! services/api/src/bin/create_user.rs
//!
//! Provisions a user account directly in the database. Users are never created
//! over HTTP.

use api_lib::{
    adapters::{DbAdapter, Store},
    error::ApiError,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use clap::Parser;
use interview_core::{DatabaseService, User};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Add a user to the interview database")]
struct Args {
    #[arg(long)]
    email: String,

    #[arg(long)]
    name: String,

    /// e.g. `interviewer`
    #[arg(long)]
    role: String,

    #[arg(long)]
    password: String,

    #[arg(long, env = "DATABASE_PATH", default_value = "interview.db")]
    database: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(args.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: args.email,
        name: args.name,
        role: args.role,
        password_hash,
    };

    let store = Arc::new(Store::open(&args.database).await?);
    let result = DbAdapter::new(store.clone()).create_user(&user).await;
    store.shutdown().await;
    result?;

    println!("Created user {} <{}> with role '{}'", user.id, user.email, user.role);
    Ok(())
}
