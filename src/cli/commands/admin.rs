//! Account bootstrap commands. The API has no self-registration, so the
//! first administrator is created here, directly against the database.

use anyhow::{bail, Context};
use clap::Subcommand;

use crate::auth::Role;
use crate::database::manager::DatabaseManager;
use crate::database::models::identity::{Identity, STATUS_ACTIVE};
use crate::handlers::utils::hash_password;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Create an administrator account")]
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },

    #[command(about = "List administrator accounts")]
    List,
}

pub async fn run(cmd: AdminCommands) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Create {
            username,
            password,
            name,
        } => create(username, password, name).await,
        AdminCommands::List => list().await,
    }
}

async fn create(username: String, password: String, name: String) -> anyhow::Result<()> {
    let username = username.trim().to_string();
    if username.is_empty() || password.is_empty() || name.trim().is_empty() {
        bail!("username, password and name must all be non-empty");
    }

    let pool = DatabaseManager::pool()
        .await
        .context("failed to connect to database")?;

    let taken: Option<uuid::Uuid> =
        sqlx::query_scalar("SELECT id FROM identities WHERE username = $1")
            .bind(&username)
            .fetch_optional(&pool)
            .await?;
    if taken.is_some() {
        bail!("username '{}' is already in use", username);
    }

    let password_hash = hash_password(&password)?;

    let identity = sqlx::query_as::<_, Identity>(
        r#"
        INSERT INTO identities (username, password_hash, name, nickname, phone, role, status)
        VALUES ($1, $2, $3, '', '', $4, $5)
        RETURNING *
        "#,
    )
    .bind(&username)
    .bind(&password_hash)
    .bind(name.trim())
    .bind(Role::Admin.as_str())
    .bind(STATUS_ACTIVE)
    .fetch_one(&pool)
    .await?;

    println!("created administrator {} ({})", identity.username, identity.id);
    Ok(())
}

async fn list() -> anyhow::Result<()> {
    let pool = DatabaseManager::pool()
        .await
        .context("failed to connect to database")?;

    let admins = sqlx::query_as::<_, Identity>(
        "SELECT * FROM identities WHERE role = $1 ORDER BY created_at",
    )
    .bind(Role::Admin.as_str())
    .fetch_all(&pool)
    .await?;

    if admins.is_empty() {
        println!("no administrator accounts");
        return Ok(());
    }

    for admin in admins {
        println!(
            "{}  {}  {}  [{}]",
            admin.id, admin.username, admin.name, admin.status
        );
    }
    Ok(())
}
