use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EmployeeRole {
    Manager,
    Employee,
}

impl EmployeeRole {
    /// Numeric role id carried in JWT claims.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(EmployeeRole::Manager),
            2 => Some(EmployeeRole::Employee),
            _ => None,
        }
    }
}

/// A tracked employee as exposed by the user-management collaborator.
/// Active employees make up the reporting population.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1000,
        "first_name": "Anna",
        "last_name": "Keller",
        "email": "anna.keller@company.com",
        "role": "employee",
        "is_active": true
    })
)]
pub struct Employee {
    #[schema(example = 1000)]
    pub id: u64,

    #[schema(example = "Anna")]
    pub first_name: String,

    #[schema(example = "Keller")]
    pub last_name: String,

    #[schema(example = "anna.keller@company.com")]
    pub email: String,

    #[schema(example = "employee")]
    pub role: EmployeeRole,

    #[schema(example = true)]
    pub is_active: bool,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
