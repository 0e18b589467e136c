use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A registered work site. Employees check in against its opaque
/// `check_in_token`; inactive sites resolve like unknown ones.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "name": "North Depot",
        "address": "14 Harbour Rd",
        "description": "Loading dock and warehouse",
        "check_in_token": "3e2c0b68-7a31-4b41-9a5f-d2f4c9a8e011",
        "is_active": true
    })
)]
pub struct WorkSite {
    #[schema(example = 3)]
    pub id: u64,

    #[schema(example = "North Depot")]
    pub name: String,

    #[schema(example = "14 Harbour Rd")]
    pub address: String,

    #[schema(example = "Loading dock and warehouse", nullable = true)]
    pub description: Option<String>,

    /// Opaque token embedded in the site's QR code. Regenerable.
    #[schema(example = "3e2c0b68-7a31-4b41-9a5f-d2f4c9a8e011")]
    pub check_in_token: String,

    #[schema(example = true)]
    pub is_active: bool,
}
