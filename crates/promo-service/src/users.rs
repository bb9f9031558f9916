//! User administration.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use promo_storage::{TasteRepository, UserRepository};
use promo_types::User;
use promo_vector::TasteVectorIndex;

use crate::error::ServiceError;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    tastes: Arc<dyn TasteRepository>,
    index: Arc<TasteVectorIndex>,
}

fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{} must not be blank", field)));
    }
    Ok(value.to_string())
}

impl UserService {
    /// Create a new user service.
    pub fn new(
        users: Arc<dyn UserRepository>,
        tastes: Arc<dyn TasteRepository>,
        index: Arc<TasteVectorIndex>,
    ) -> Self {
        Self {
            users,
            tastes,
            index,
        }
    }

    pub async fn create_user(&self, name: &str, phone: &str) -> Result<User, ServiceError> {
        let user = User::new(required("name", name)?, required("phone", phone)?);
        self.users.save(&user).await?;
        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Change name and/or phone. Fields left as `None` keep their value.
    pub async fn update_user(
        &self,
        id: &str,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<User, ServiceError> {
        let mut user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", id)))?;

        if let Some(name) = name {
            user.name = required("name", name)?;
        }
        if let Some(phone) = phone {
            user.phone = required("phone", phone)?;
        }
        user.updated_at = Utc::now();

        self.users.save(&user).await?;
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users.find_by_id(id).await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.users.find_all().await?)
    }

    /// Delete a user with all their tastes. Vectors go first so a failure
    /// leaves the user intact.
    pub async fn delete_user(&self, id: &str) -> Result<bool, ServiceError> {
        if self.users.find_by_id(id).await?.is_none() {
            return Ok(false);
        }

        let point_ids: Vec<String> = self
            .tastes
            .find_by_user(id)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        let tastes = point_ids.len();
        self.index.delete_many(point_ids).await?;

        let deleted = self.users.delete(id).await?;
        info!(user_id = id, tastes, "User deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promo_storage::InMemoryStore;
    use promo_types::{Distance, Taste};
    use promo_vector::{InMemoryVectorStore, TastePayload};

    fn setup() -> (Arc<InMemoryStore>, Arc<InMemoryVectorStore>, UserService) {
        let store = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorStore::with_collection(2, Distance::Cosine));
        let index = Arc::new(TasteVectorIndex::new(vectors.clone(), 2, Distance::Cosine));
        let service = UserService::new(store.clone(), store.clone(), index);
        (store, vectors, service)
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let (_, _, service) = setup();
        let user = service.create_user(" Alice ", "111").await.unwrap();
        assert_eq!(user.name, "Alice");

        let updated = service
            .update_user(&user.id, None, Some("222"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Alice");
        assert_eq!(updated.phone, "222");
        assert_eq!(service.list_users().await.unwrap().len(), 1);

        assert!(matches!(
            service.create_user("Bob", " ").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.update_user("missing", Some("x"), None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_rows_and_vectors() {
        let (store, vectors, service) = setup();
        let index = TasteVectorIndex::new(vectors.clone(), 2, Distance::Cosine);
        let user = service.create_user("Alice", "111").await.unwrap();

        for label in ["games", "coffee"] {
            let taste = Taste::new(&user.id, label, "m");
            TasteRepository::save(store.as_ref(), &taste).await.unwrap();
            index
                .upsert(
                    &taste.id,
                    vec![1.0, 0.0],
                    TastePayload {
                        taste_id: taste.id.clone(),
                        user_id: user.id.clone(),
                        label: label.to_string(),
                        original_label: None,
                    },
                )
                .await
                .unwrap();
        }

        assert!(service.delete_user(&user.id).await.unwrap());
        assert_eq!(store.taste_count(), 0);
        assert!(vectors.is_empty());
        assert!(!service.delete_user(&user.id).await.unwrap());
    }
}
