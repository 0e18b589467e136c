use crate::auth::auth::AuthUser;
use crate::model::work_site::WorkSite;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const SITE_COLUMNS: &str = "id, name, address, description, check_in_token, is_active";

#[derive(Deserialize, ToSchema)]
pub struct CreateWorkSite {
    #[schema(example = "North Depot")]
    pub name: String,
    #[schema(example = "14 Harbour Rd")]
    pub address: String,
    #[schema(example = "Loading dock and warehouse")]
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateWorkSite {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct WorkSiteQuery {
    /// Page number (1-based)
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
    /// Filter by active flag
    pub is_active: Option<bool>,
    /// Search by name or address
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkSiteListResponse {
    pub data: Vec<WorkSite>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 4)]
    pub total: i64,
}

async fn fetch_site(pool: &MySqlPool, id: u64) -> Result<Option<WorkSite>, sqlx::Error> {
    sqlx::query_as::<_, WorkSite>(&format!(
        "SELECT {SITE_COLUMNS} FROM work_sites WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// List work sites
#[utoipa::path(
    get,
    path = "/api/v1/sites",
    params(WorkSiteQuery),
    responses(
        (status = 200, description = "Paginated site list", body = WorkSiteListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkSite"
)]
pub async fn list_sites(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WorkSiteQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut conditions = Vec::new();
    let mut bindings: Vec<sqlx::types::JsonValue> = Vec::new();

    if let Some(is_active) = query.is_active {
        conditions.push("is_active = ?");
        bindings.push(is_active.into());
    }

    if let Some(search) = &query.search {
        conditions.push("(name LIKE ? OR address LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone().into());
        bindings.push(like.into());
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM work_sites {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to count work sites");
        ErrorInternalServerError("Database error")
    })?;

    let data_sql = format!(
        "SELECT {SITE_COLUMNS} FROM work_sites {} ORDER BY name LIMIT ? OFFSET ?",
        where_clause
    );
    let mut data_query = sqlx::query_as::<_, WorkSite>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    let sites = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch work sites");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(WorkSiteListResponse {
        data: sites,
        page,
        per_page,
        total,
    }))
}

/// Create a work site. The check-in token is minted here and embedded in the
/// site's QR code by the rendering collaborator.
#[utoipa::path(
    post,
    path = "/api/v1/sites",
    request_body = CreateWorkSite,
    responses(
        (status = 201, description = "Site created", body = WorkSite),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkSite"
)]
pub async fn create_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorkSite>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let token = Uuid::new_v4().to_string();
    let result = sqlx::query(
        "INSERT INTO work_sites (name, address, description, check_in_token) VALUES (?, ?, ?, ?)",
    )
    .bind(&payload.name)
    .bind(&payload.address)
    .bind(&payload.description)
    .bind(&token)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create work site");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let site = fetch_site(pool.get_ref(), result.last_insert_id())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch created work site");
            ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Created().json(site))
}

/// Get a work site by ID
#[utoipa::path(
    get,
    path = "/api/v1/sites/{site_id}",
    params(
        ("site_id" = u64, Path, description = "Work site ID")
    ),
    responses(
        (status = 200, description = "Site found", body = WorkSite),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Site not found", body = Object, example = json!({
            "message": "Work site not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkSite"
)]
pub async fn get_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let site_id = path.into_inner();
    let site = fetch_site(pool.get_ref(), site_id).await.map_err(|e| {
        error!(error = %e, site_id, "Failed to fetch work site");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match site {
        Some(site) => Ok(HttpResponse::Ok().json(site)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Work site not found"
        }))),
    }
}

/// Update a work site's name, address or description
#[utoipa::path(
    put,
    path = "/api/v1/sites/{site_id}",
    params(
        ("site_id" = u64, Path, description = "Work site ID")
    ),
    request_body = UpdateWorkSite,
    responses(
        (status = 200, description = "Site updated", body = WorkSite),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Site not found", body = Object, example = json!({
            "message": "Work site not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkSite"
)]
pub async fn update_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateWorkSite>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let site_id = path.into_inner();
    let result = sqlx::query(
        "UPDATE work_sites SET \
         name = COALESCE(?, name), \
         address = COALESCE(?, address), \
         description = COALESCE(?, description) \
         WHERE id = ?",
    )
    .bind(&payload.name)
    .bind(&payload.address)
    .bind(&payload.description)
    .bind(site_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, site_id, "Failed to update work site");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Work site not found"
        })));
    }

    let site = fetch_site(pool.get_ref(), site_id).await.map_err(|e| {
        error!(error = %e, site_id, "Failed to fetch updated work site");
        ErrorInternalServerError("Internal Server Error")
    })?;
    Ok(HttpResponse::Ok().json(site))
}

/// Flip a site between active and inactive. Inactive sites reject check-ins
/// exactly like unknown tokens.
#[utoipa::path(
    patch,
    path = "/api/v1/sites/{site_id}/toggle-status",
    params(
        ("site_id" = u64, Path, description = "Work site ID")
    ),
    responses(
        (status = 200, description = "Status flipped", body = WorkSite),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Site not found", body = Object, example = json!({
            "message": "Work site not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkSite"
)]
pub async fn toggle_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let site_id = path.into_inner();
    let result = sqlx::query("UPDATE work_sites SET is_active = NOT is_active WHERE id = ?")
        .bind(site_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, site_id, "Failed to toggle work site status");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Work site not found"
        })));
    }

    let site = fetch_site(pool.get_ref(), site_id).await.map_err(|e| {
        error!(error = %e, site_id, "Failed to fetch toggled work site");
        ErrorInternalServerError("Internal Server Error")
    })?;
    Ok(HttpResponse::Ok().json(site))
}

/// Mint a fresh check-in token, invalidating printed QR codes for the site.
#[utoipa::path(
    post,
    path = "/api/v1/sites/{site_id}/regenerate-token",
    params(
        ("site_id" = u64, Path, description = "Work site ID")
    ),
    responses(
        (status = 200, description = "Token regenerated", body = WorkSite),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Site not found", body = Object, example = json!({
            "message": "Work site not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkSite"
)]
pub async fn regenerate_token(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let site_id = path.into_inner();
    let token = Uuid::new_v4().to_string();
    let result = sqlx::query("UPDATE work_sites SET check_in_token = ? WHERE id = ?")
        .bind(&token)
        .bind(site_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, site_id, "Failed to regenerate site token");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Work site not found"
        })));
    }

    let site = fetch_site(pool.get_ref(), site_id).await.map_err(|e| {
        error!(error = %e, site_id, "Failed to fetch work site after token refresh");
        ErrorInternalServerError("Internal Server Error")
    })?;
    Ok(HttpResponse::Ok().json(site))
}
