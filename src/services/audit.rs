use sqlx::MySqlPool;
use tracing::{debug, error};

use crate::auth::auth::AuthUser;

/// One row for `recent_activities`.
#[derive(Debug, Clone)]
pub struct Activity {
    pub action: &'static str,
    pub entity: &'static str,
    pub entity_id: Option<String>,
    pub actor_email: Option<String>,
    pub description: String,
}

impl Activity {
    pub fn new(action: &'static str, entity: &'static str, description: impl Into<String>) -> Self {
        Self {
            action,
            entity,
            entity_id: None,
            actor_email: None,
            description: description.into(),
        }
    }

    pub fn entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn by(mut self, user: &AuthUser) -> Self {
        self.actor_email = Some(user.email.clone());
        self
    }
}

pub async fn write(pool: &MySqlPool, activity: &Activity) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO recent_activities (action, entity, entity_id, actor_email, description)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(activity.action)
    .bind(activity.entity)
    .bind(&activity.entity_id)
    .bind(&activity.actor_email)
    .bind(&activity.description)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fire-and-forget audit write. A failure is logged and never reaches the
/// request that triggered it.
pub fn record(pool: &MySqlPool, activity: Activity) {
    let pool = pool.clone();
    actix_web::rt::spawn(async move {
        match write(&pool, &activity).await {
            Ok(()) => debug!(action = activity.action, "Audit entry written"),
            Err(e) => error!(error = %e, action = activity.action, "Failed to write audit entry"),
        }
    });
}
