//! Role and identity provider
//!
//! The workflow only asks boolean capability questions; how an actor's role
//! is decided stays behind [`IdentityProvider`].

use crate::config::ConfigError;
use crate::error::{not_found_error, validation_error, AppError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Handbook roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Reads the handbook only
    #[default]
    Employee,
    /// Proposes changes to policies owned by their department
    DepartmentHead,
    /// Proposes and reviews anything
    Admin,
}

impl Role {
    pub fn can_propose(&self) -> bool {
        matches!(self, Role::DepartmentHead | Role::Admin)
    }

    pub fn can_review(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn requires_department(&self) -> bool {
        matches!(self, Role::DepartmentHead)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Employee => write!(f, "employee"),
            Role::DepartmentHead => write!(f, "department_head"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub department: Option<Uuid>,
}

impl Actor {
    /// Admins cover every department, heads only their own
    pub fn covers(&self, department: Option<Uuid>) -> bool {
        match self.role {
            Role::Admin => true,
            Role::DepartmentHead => department.is_some() && department == self.department,
            Role::Employee => false,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.role.requires_department() && self.department.is_none() {
            return Err(validation_error(format!(
                "Actor {} has role {} and must belong to a department",
                self.name, self.role
            )));
        }
        Ok(())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn actor(&self, id: Uuid) -> Result<Actor, AppError>;

    /// Whether `actor` may submit a proposal touching a policy owned by `department`
    async fn can_submit(&self, actor: Uuid, department: Option<Uuid>) -> Result<bool, AppError>;

    async fn can_review(&self, actor: Uuid) -> Result<bool, AppError>;

    /// Whether `actor` may see and resolve questions about policies owned by `department`
    async fn can_answer(&self, actor: Uuid, department: Option<Uuid>) -> Result<bool, AppError>;
}

/// Identity directory kept in memory, optionally seeded from a JSON file
pub struct InMemoryDirectory {
    actors: RwLock<HashMap<Uuid, Actor>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            actors: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_actors(actors: Vec<Actor>) -> Result<Self, AppError> {
        let mut map = HashMap::new();
        for actor in actors {
            actor.validate()?;
            map.insert(actor.id, actor);
        }
        Ok(Self {
            actors: RwLock::new(map),
        })
    }

    /// Load a JSON array of actors
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let actors: Vec<Actor> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let count = actors.len();
        let directory =
            Self::with_actors(actors).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        info!("Loaded {} actor(s) from {}", count, path.display());
        Ok(directory)
    }

}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryDirectory {
    async fn actor(&self, id: Uuid) -> Result<Actor, AppError> {
        let actors = self.actors.read().await;
        actors
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error(format!("Actor {} not found", id)))
    }

    async fn can_submit(&self, actor: Uuid, department: Option<Uuid>) -> Result<bool, AppError> {
        Ok(self.actor(actor).await?.covers(department))
    }

    async fn can_review(&self, actor: Uuid) -> Result<bool, AppError> {
        Ok(self.actor(actor).await?.role.can_review())
    }

    async fn can_answer(&self, actor: Uuid, department: Option<Uuid>) -> Result<bool, AppError> {
        Ok(self.actor(actor).await?.covers(department))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn actor(role: Role, department: Option<Uuid>) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            name: format!("{}", role),
            email: None,
            role,
            department,
        }
    }

    #[tokio::test]
    async fn test_department_head_scoped_to_own_department() {
        let hr = Uuid::new_v4();
        let head = actor(Role::DepartmentHead, Some(hr));
        let directory = InMemoryDirectory::with_actors(vec![head.clone()]).unwrap();

        assert!(directory.can_submit(head.id, Some(hr)).await.unwrap());
        assert!(!directory.can_submit(head.id, Some(Uuid::new_v4())).await.unwrap());
        assert!(!directory.can_submit(head.id, None).await.unwrap());
        assert!(!directory.can_review(head.id).await.unwrap());
        assert!(directory.can_answer(head.id, Some(hr)).await.unwrap());
        assert!(!directory.can_answer(head.id, Some(Uuid::new_v4())).await.unwrap());
    }

    #[tokio::test]
    async fn test_roles() {
        let admin = actor(Role::Admin, None);
        let employee = actor(Role::Employee, None);
        let directory =
            InMemoryDirectory::with_actors(vec![admin.clone(), employee.clone()]).unwrap();

        assert!(directory.can_submit(admin.id, None).await.unwrap());
        assert!(directory.can_review(admin.id).await.unwrap());
        assert!(!directory.can_submit(employee.id, None).await.unwrap());
        assert!(!directory.can_review(employee.id).await.unwrap());
        assert!(!directory.can_answer(employee.id, None).await.unwrap());
        assert!(matches!(
            directory.can_review(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_department_head_needs_department() {
        let result = InMemoryDirectory::with_actors(vec![actor(Role::DepartmentHead, None)]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_from_file() {
        let admin = actor(Role::Admin, None);
        let path = std::env::temp_dir().join(format!("actors-{}.json", Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", serde_json::to_string(&vec![admin]).unwrap()).unwrap();

        assert!(InMemoryDirectory::from_file(&path).is_ok());
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            InMemoryDirectory::from_file(&path),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
