use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{SubscriptionStatus, TeamEntity, UserEntity},
    dto::{format_system_time, validation::validate_not_blank},
};

/// Registration payload; the email comes from the identity header.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterUserRequest {
    /// Name of the team created alongside the user.
    #[validate(length(min = 1, max = 100), custom(function = validate_not_blank))]
    pub team_name: String,
}

/// Subscription state exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatusDto {
    Inactive,
    Active,
    Canceled,
}

impl From<SubscriptionStatus> for SubscriptionStatusDto {
    fn from(value: SubscriptionStatus) -> Self {
        match value {
            SubscriptionStatus::Inactive => SubscriptionStatusDto::Inactive,
            SubscriptionStatus::Active => SubscriptionStatusDto::Active,
            SubscriptionStatus::Canceled => SubscriptionStatusDto::Canceled,
        }
    }
}

/// Public projection of a registered user.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub team_id: Uuid,
    pub subscription: SubscriptionStatusDto,
    pub created_at: String,
}

impl From<UserEntity> for UserSummary {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            email: value.email,
            team_id: value.team_id,
            subscription: value.subscription.into(),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Public projection of a team.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: String,
}

impl From<TeamEntity> for TeamSummary {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            owner_id: value.owner_id,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Returned once a user and their team have been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationResponse {
    pub user: UserSummary,
    pub team: TeamSummary,
}
