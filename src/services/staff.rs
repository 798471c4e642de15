use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::hash_password;
use crate::db::DbPool;
use crate::entities::{inventory_log, payroll, profile, schedule, user};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct NewStaffMember {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: user::Role,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStaffMember {
    pub role: Option<user::Role>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewScheduleEntry {
    pub staff_id: i32,
    #[validate(length(min = 1, max = 200))]
    pub event: String,
    pub scheduled_at: DateTime<Utc>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffMember {
    pub user: user::Model,
    pub profile: profile::Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffMemberDetails {
    pub user: user::Model,
    pub profile: profile::Model,
    pub schedules: Vec<schedule::Model>,
    pub payrolls: Vec<payroll::Model>,
}

/// Staff are account + profile pairs. Creation and deletion touch both rows
/// (and the calendar and payroll on delete) inside one transaction.
#[derive(Clone)]
pub struct StaffService {
    db: Arc<DbPool>,
}

impl StaffService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_staff(&self, payload: NewStaffMember) -> Result<StaffMember, ServiceError> {
        payload.validate()?;

        let txn = self.db.begin().await?;

        let username_taken = user::Entity::find()
            .filter(user::Column::Username.eq(&payload.username))
            .one(&txn)
            .await?
            .is_some();
        if username_taken {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                payload.username
            )));
        }

        let account = user::ActiveModel {
            username: Set(payload.username),
            hashed_password: Set(hash_password(&payload.password)),
            role: Set(payload.role),
            disabled: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let contact = profile::ActiveModel {
            user_id: Set(account.id),
            first_name: Set(payload.first_name),
            last_name: Set(payload.last_name),
            email: Set(payload.email),
            phone: Set(payload.phone),
            department: Set(payload.department),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(staff_id = account.id, "staff member created");

        Ok(StaffMember {
            user: account,
            profile: contact,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_staff(&self) -> Result<Vec<StaffMember>, ServiceError> {
        let rows = user::Entity::find()
            .order_by_asc(user::Column::Id)
            .find_with_related(profile::Entity)
            .all(&*self.db)
            .await?;

        // Accounts without a profile are plain API users, not staff.
        Ok(rows
            .into_iter()
            .filter_map(|(account, mut profiles)| {
                profiles.pop().map(|contact| StaffMember {
                    user: account,
                    profile: contact,
                })
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_staff(&self, id: i32) -> Result<StaffMemberDetails, ServiceError> {
        let account = user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Staff member {} not found", id)))?;

        let contact = profile::Entity::find()
            .filter(profile::Column::UserId.eq(id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Staff member {} not found", id)))?;

        let schedules = schedule::Entity::find()
            .filter(schedule::Column::StaffId.eq(id))
            .order_by_asc(schedule::Column::ScheduledAt)
            .all(&*self.db)
            .await?;

        let payrolls = payroll::Entity::find()
            .filter(payroll::Column::StaffId.eq(id))
            .order_by_asc(payroll::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(StaffMemberDetails {
            user: account,
            profile: contact,
            schedules,
            payrolls,
        })
    }

    #[instrument(skip(self, payload))]
    pub async fn update_staff(
        &self,
        id: i32,
        payload: UpdateStaffMember,
    ) -> Result<StaffMember, ServiceError> {
        payload.validate()?;
        let details = self.get_staff(id).await?;

        let txn = self.db.begin().await?;

        let mut account: user::ActiveModel = details.user.into();
        if let Some(role) = payload.role {
            account.role = Set(role);
        }
        let account = account.update(&txn).await?;

        let mut contact: profile::ActiveModel = details.profile.into();
        if let Some(first_name) = payload.first_name {
            contact.first_name = Set(first_name);
        }
        if let Some(last_name) = payload.last_name {
            contact.last_name = Set(last_name);
        }
        if let Some(email) = payload.email {
            contact.email = Set(email);
        }
        if let Some(phone) = payload.phone {
            contact.phone = Set(Some(phone));
        }
        if let Some(department) = payload.department {
            contact.department = Set(Some(department));
        }
        let contact = contact.update(&txn).await?;

        txn.commit().await?;
        Ok(StaffMember {
            user: account,
            profile: contact,
        })
    }

    /// Removes calendar entries, payroll rows and the profile together with
    /// the account. Refused while inventory logs still reference the account.
    #[instrument(skip(self))]
    pub async fn delete_staff(&self, id: i32) -> Result<(), ServiceError> {
        let details = self.get_staff(id).await?;

        let log_refs = inventory_log::Entity::find()
            .filter(inventory_log::Column::ChangedBy.eq(id))
            .count(&*self.db)
            .await?;
        if log_refs > 0 {
            return Err(ServiceError::ValidationError(format!(
                "Staff member {} has {} inventory log entries and cannot be deleted",
                id, log_refs
            )));
        }

        let txn = self.db.begin().await?;

        schedule::Entity::delete_many()
            .filter(schedule::Column::StaffId.eq(id))
            .exec(&txn)
            .await?;
        payroll::Entity::delete_many()
            .filter(payroll::Column::StaffId.eq(id))
            .exec(&txn)
            .await?;
        profile::Entity::delete_by_id(details.profile.id)
            .exec(&txn)
            .await?;
        user::Entity::delete_by_id(details.user.id).exec(&txn).await?;

        txn.commit().await?;
        info!(staff_id = id, "staff member deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_schedule(
        &self,
        staff_id: Option<i32>,
    ) -> Result<Vec<schedule::Model>, ServiceError> {
        let mut query = schedule::Entity::find().order_by_asc(schedule::Column::ScheduledAt);
        if let Some(staff_id) = staff_id {
            query = query.filter(schedule::Column::StaffId.eq(staff_id));
        }
        Ok(query.all(&*self.db).await?)
    }

    #[instrument(skip(self, payload))]
    pub async fn add_schedule_entry(
        &self,
        payload: NewScheduleEntry,
    ) -> Result<schedule::Model, ServiceError> {
        payload.validate()?;

        // The target must be a staff member, not just any account.
        self.get_staff(payload.staff_id).await?;

        let entry = schedule::ActiveModel {
            staff_id: Set(payload.staff_id),
            event: Set(payload.event),
            scheduled_at: Set(payload.scheduled_at),
            description: Set(payload.description),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(schedule_id = entry.id, staff_id = entry.staff_id, "schedule entry added");
        Ok(entry)
    }
}
