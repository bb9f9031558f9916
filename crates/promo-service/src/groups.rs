//! Monitored group administration.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use promo_storage::GroupRepository;
use promo_types::Group;

use crate::error::ServiceError;

pub struct GroupService {
    groups: Arc<dyn GroupRepository>,
}

fn external_id(value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::InvalidInput(
            "external id must not be blank".to_string(),
        ));
    }
    Ok(value.to_string())
}

fn description(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

impl GroupService {
    /// Create a new group service.
    pub fn new(groups: Arc<dyn GroupRepository>) -> Self {
        Self { groups }
    }

    /// Register a group. External ids are unique; a duplicate surfaces as a
    /// storage conflict.
    pub async fn create_group(
        &self,
        external: &str,
        desc: Option<&str>,
    ) -> Result<Group, ServiceError> {
        let group = Group::new(external_id(external)?, description(desc));
        self.groups.save(&group).await?;
        info!(group_id = %group.id, external_id = %group.external_id, "Group registered");
        Ok(group)
    }

    /// Change external id and/or description. An empty description clears it.
    pub async fn update_group(
        &self,
        id: &str,
        external: Option<&str>,
        desc: Option<&str>,
    ) -> Result<Group, ServiceError> {
        let mut group = self
            .groups
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("group {}", id)))?;

        if let Some(external) = external {
            group.external_id = external_id(external)?;
        }
        if desc.is_some() {
            group.description = description(desc);
        }
        group.updated_at = Utc::now();

        self.groups.save(&group).await?;
        Ok(group)
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self.groups.find_by_id(id).await?)
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        Ok(self.groups.find_all().await?)
    }

    pub async fn delete_group(&self, id: &str) -> Result<bool, ServiceError> {
        let deleted = self.groups.delete(id).await?;
        if deleted {
            info!(group_id = id, "Group deleted");
        }
        Ok(deleted)
    }
}
