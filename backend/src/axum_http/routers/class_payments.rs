use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::{
        repositories::{
            class_participations::ClassParticipationRepository, classes::ClassRepository,
            enrollments::EnrollmentRepository, slot_reservations::SlotReservationRepository,
            waitlist::WaitlistRepository,
        },
        value_objects::class_payments::{
            ClassPaymentResponse, PayingUser, ReconciliationType, VerifyClassPaymentRequest,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            class_participations::ClassParticipationPostgres, classes::ClassPostgres,
            enrollments::EnrollmentPostgres, slot_reservations::SlotReservationPostgres,
            waitlist::WaitlistPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use tracing::warn;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::class_payments::{ClassPaymentOutcome, ClassPaymentUseCase, PaymentGateway},
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let class_payments_usecase = ClassPaymentUseCase::new(
        Arc::new(ClassPostgres::new(Arc::clone(&db_pool))),
        Arc::new(EnrollmentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ClassParticipationPostgres::new(Arc::clone(&db_pool))),
        Arc::new(WaitlistPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SlotReservationPostgres::new(Arc::clone(&db_pool))),
        stripe_client,
    );

    router(Arc::new(class_payments_usecase))
}

pub fn router<C, E, P, W, R, G>(usecase: Arc<ClassPaymentUseCase<C, E, P, W, R, G>>) -> Router
where
    C: ClassRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    P: ClassParticipationRepository + Send + Sync + 'static,
    W: WaitlistRepository + Send + Sync + 'static,
    R: SlotReservationRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/verify", post(verify_class_payment::<C, E, P, W, R, G>))
        .route("/webhook", post(stripe_webhook::<C, E, P, W, R, G>))
        .with_state(usecase)
}

pub async fn verify_class_payment<C, E, P, W, R, G>(
    State(usecase): State<Arc<ClassPaymentUseCase<C, E, P, W, R, G>>>,
    auth: AuthUser,
    payload: Result<Json<VerifyClassPaymentRequest>, JsonRejection>,
) -> Result<Response, AppError>
where
    C: ClassRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    P: ClassParticipationRepository + Send + Sync + 'static,
    W: WaitlistRepository + Send + Sync + 'static,
    R: SlotReservationRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let Json(request) = payload.map_err(|rejection| {
        warn!(
            user_id = %auth.user_id,
            rejection = %rejection.body_text(),
            "class_payments router: invalid verify request body"
        );
        AppError::BadRequest("sessionId is required".to_string())
    })?;

    let payer = PayingUser::from(&auth);
    let outcome = usecase
        .verify_class_payment(&request.session_id, &payer)
        .await?;

    outcome_response(outcome)
}

pub async fn stripe_webhook<C, E, P, W, R, G>(
    State(usecase): State<Arc<ClassPaymentUseCase<C, E, P, W, R, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError>
where
    C: ClassRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    P: ClassParticipationRepository + Send + Sync + 'static,
    W: WaitlistRepository + Send + Sync + 'static,
    R: SlotReservationRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("class_payments router: webhook without Stripe-Signature header");
            AppError::BadRequest("missing Stripe-Signature header".to_string())
        })?;

    let outcome = usecase.handle_stripe_webhook(&body, signature).await?;

    match outcome {
        Some(ClassPaymentOutcome::PaymentIncomplete { .. }) | None => {
            Ok((StatusCode::OK, Json(json!({ "received": true }))).into_response())
        }
        Some(outcome) => outcome_response(outcome),
    }
}

fn outcome_response(outcome: ClassPaymentOutcome) -> Result<Response, AppError> {
    let response = match outcome {
        ClassPaymentOutcome::PaymentIncomplete { .. } => {
            return Err(AppError::BadRequest("Payment not completed".to_string()));
        }
        ClassPaymentOutcome::SlotReserved {
            reservation_id,
            already_reserved,
        } => ClassPaymentResponse {
            success: true,
            message: Some(
                if already_reserved {
                    "Slot already reserved"
                } else {
                    "Slot reserved"
                }
                .to_string(),
            ),
            participation_id: None,
            reservation_id: Some(reservation_id),
            existing_participation_id: None,
            type_: Some(ReconciliationType::SlotReservation),
        },
        ClassPaymentOutcome::ClassParticipationPaid {
            participation_id, ..
        } => ClassPaymentResponse {
            success: true,
            message: Some("Payment verified and class participation recorded".to_string()),
            participation_id: Some(participation_id),
            reservation_id: None,
            existing_participation_id: None,
            type_: Some(ReconciliationType::ClassParticipation),
        },
        ClassPaymentOutcome::AlreadyProcessed { participation_id } => ClassPaymentResponse {
            success: true,
            message: Some("Payment already processed".to_string()),
            participation_id: None,
            reservation_id: None,
            existing_participation_id: Some(participation_id),
            type_: Some(ReconciliationType::ClassParticipation),
        },
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
