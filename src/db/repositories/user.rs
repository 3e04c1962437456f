use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::domain::Role;
use crate::entities::users;

/// User row as seen by the rest of the crate.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    pub created_at: String,
}

fn map_user(model: users::Model) -> Result<User> {
    let role = model
        .role
        .parse::<Role>()
        .map_err(anyhow::Error::msg)
        .context("Corrupt role column")?;

    Ok(User {
        id: model.id,
        email: model.email,
        name: model.name,
        phone: model.phone,
        role,
        created_at: model.created_at,
    })
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts a new user. The email must not already exist; callers check
    /// first and the unique index backs them up.
    pub async fn create(&self, email: &str, name: &str, phone: &str, role: Role) -> Result<User> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            email: Set(email.to_string()),
            name: Set(name.to_string()),
            phone: Set(phone.to_string()),
            role: Set(role.as_str().to_string()),
            created_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        map_user(model)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        user.map(map_user).transpose()
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        user.map(map_user).transpose()
    }

    /// Batch lookup used when enriching pending requests for display.
    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = users::Entity::find()
            .filter(users::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await
            .context("Failed to query users by IDs")?;

        rows.into_iter().map(map_user).collect()
    }
}
