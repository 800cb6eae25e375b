use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::{
        repositories::classes::ClassRepository,
        value_objects::class_generation::BulkClassRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::classes::ClassPostgres,
    },
};
use tracing::{info, warn};

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError,
    usecases::class_generation::ClassGenerationUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let classes_repository = ClassPostgres::new(Arc::clone(&db_pool));
    let class_generation_usecase = ClassGenerationUseCase::new(Arc::new(classes_repository));

    router(Arc::new(class_generation_usecase))
}

pub fn router<T>(usecase: Arc<ClassGenerationUseCase<T>>) -> Router
where
    T: ClassRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/bulk/preview", post(preview_bulk::<T>))
        .route("/bulk", post(create_bulk::<T>))
        .with_state(usecase)
}

pub async fn preview_bulk<T>(
    State(class_generation_usecase): State<Arc<ClassGenerationUseCase<T>>>,
    auth: AuthUser,
    payload: Result<Json<BulkClassRequest>, JsonRejection>,
) -> Result<Response, AppError>
where
    T: ClassRepository + Send + Sync + 'static,
{
    let request = parse_body(&auth, payload)?;
    info!(
        user_id = %auth.user_id,
        role = %auth.role,
        "classes router: bulk preview requested"
    );

    let preview = class_generation_usecase.preview(request)?;

    Ok((StatusCode::OK, Json(preview)).into_response())
}

pub async fn create_bulk<T>(
    State(class_generation_usecase): State<Arc<ClassGenerationUseCase<T>>>,
    auth: AuthUser,
    payload: Result<Json<BulkClassRequest>, JsonRejection>,
) -> Result<Response, AppError>
where
    T: ClassRepository + Send + Sync + 'static,
{
    let request = parse_body(&auth, payload)?;
    info!(
        user_id = %auth.user_id,
        role = %auth.role,
        "classes router: bulk create requested"
    );

    let created = class_generation_usecase.bulk_create(request).await?;

    Ok((StatusCode::CREATED, Json(created)).into_response())
}

fn parse_body(
    auth: &AuthUser,
    payload: Result<Json<BulkClassRequest>, JsonRejection>,
) -> Result<BulkClassRequest, AppError> {
    payload.map(|Json(request)| request).map_err(|rejection| {
        let reason = rejection.body_text();
        warn!(
            user_id = %auth.user_id,
            rejection = %reason,
            "classes router: invalid bulk class request body"
        );
        AppError::BadRequest(reason)
    })
}
