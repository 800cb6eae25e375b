use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crates::{
    domain::{
        entities::{
            classes::ClassEntity, enrollments::InsertEnrollmentEntity,
            slot_reservations::InsertSlotReservationEntity,
        },
        repositories::{
            class_participations::ClassParticipationRepository, classes::ClassRepository,
            enrollments::EnrollmentRepository, slot_reservations::SlotReservationRepository,
            waitlist::WaitlistRepository,
        },
        value_objects::{
            class_payments::{
                ClassPaymentCommit, ClassPaymentCommitResult, EnrollmentResolution,
                PAYMENT_METHOD_STRIPE, PLACEHOLDER_LEVEL, ParticipationResolution, PayingUser,
                PaymentTarget, SubscriptionSnapshot,
            },
            enums::{
                enrollment_statuses::EnrollmentStatus, payment_statuses::PaymentStatus,
                reservation_statuses::ReservationStatus,
            },
        },
    },
    payments::stripe_client::{
        StripeCheckoutSession, StripeClient, StripeEvent, StripeSubscription,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const HANDLED_WEBHOOK_EVENTS: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn retrieve_checkout_session(&self, session_id: &str)
    -> AnyResult<StripeCheckoutSession>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> AnyResult<StripeCheckoutSession> {
        self.retrieve_checkout_session(session_id).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[derive(Debug, Error)]
pub enum ClassPaymentError {
    #[error("sessionId is required")]
    MissingSessionId,
    #[error("missing {0} in session metadata")]
    MissingMetadata(&'static str),
    #[error("invalid session metadata: {0}")]
    InvalidMetadata(&'static str),
    #[error("session does not belong to the authenticated user")]
    UserMismatch,
    #[error("user email is required to enroll in a class")]
    MissingEmail,
    #[error("class not found")]
    ClassNotFound,
    #[error("invalid checkout session: {0}")]
    InvalidSession(&'static str),
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(&'static str),
    #[error("payment provider request failed")]
    Provider(#[source] anyhow::Error),
    #[error("database operation failed")]
    Persistence(#[source] anyhow::Error),
}

impl ClassPaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ClassPaymentError::UserMismatch => StatusCode::UNAUTHORIZED,
            ClassPaymentError::MissingSessionId
            | ClassPaymentError::MissingMetadata(_)
            | ClassPaymentError::InvalidMetadata(_)
            | ClassPaymentError::MissingEmail
            | ClassPaymentError::ClassNotFound
            | ClassPaymentError::InvalidSession(_)
            | ClassPaymentError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            ClassPaymentError::Provider(_) | ClassPaymentError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ClassPaymentError>;

#[derive(Debug, Clone, PartialEq)]
pub enum ClassPaymentOutcome {
    /// The provider has not confirmed the money yet; nothing was written.
    PaymentIncomplete {
        mode: Option<String>,
        status: Option<String>,
        payment_status: Option<String>,
    },
    SlotReserved {
        reservation_id: Uuid,
        already_reserved: bool,
    },
    ClassParticipationPaid {
        participation_id: Uuid,
        enrollment_id: Uuid,
        subscription_id: Option<Uuid>,
    },
    /// The participation was reconciled by an earlier confirmation of the same payment.
    AlreadyProcessed { participation_id: Uuid },
}

pub struct ClassPaymentUseCase<C, E, P, W, R, G>
where
    C: ClassRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    P: ClassParticipationRepository + Send + Sync + 'static,
    W: WaitlistRepository + Send + Sync + 'static,
    R: SlotReservationRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    class_repo: Arc<C>,
    enrollment_repo: Arc<E>,
    participation_repo: Arc<P>,
    waitlist_repo: Arc<W>,
    slot_reservation_repo: Arc<R>,
    payment_gateway: Arc<G>,
}

impl<C, E, P, W, R, G> ClassPaymentUseCase<C, E, P, W, R, G>
where
    C: ClassRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    P: ClassParticipationRepository + Send + Sync + 'static,
    W: WaitlistRepository + Send + Sync + 'static,
    R: SlotReservationRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        class_repo: Arc<C>,
        enrollment_repo: Arc<E>,
        participation_repo: Arc<P>,
        waitlist_repo: Arc<W>,
        slot_reservation_repo: Arc<R>,
        payment_gateway: Arc<G>,
    ) -> Self {
        Self {
            class_repo,
            enrollment_repo,
            participation_repo,
            waitlist_repo,
            slot_reservation_repo,
            payment_gateway,
        }
    }

    /// Records a provider-confirmed checkout session against the payer's class participation
    /// or slot reservation. Safe to call again for a session that was already reconciled.
    pub async fn verify_class_payment(
        &self,
        session_id: &str,
        payer: &PayingUser,
    ) -> UseCaseResult<ClassPaymentOutcome> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            let err = ClassPaymentError::MissingSessionId;
            warn!(
                user_id = %payer.user_id,
                status = err.status_code().as_u16(),
                "class_payments: verify requested without session id"
            );
            return Err(err);
        }

        info!(
            user_id = %payer.user_id,
            %session_id,
            "class_payments: verifying checkout session"
        );

        let session = self
            .payment_gateway
            .retrieve_checkout_session(session_id)
            .await
            .map_err(|err| {
                error!(
                    user_id = %payer.user_id,
                    %session_id,
                    error = ?err,
                    "class_payments: failed to retrieve checkout session"
                );
                ClassPaymentError::Provider(err)
            })?;

        if !session.is_completed() {
            info!(
                user_id = %payer.user_id,
                %session_id,
                mode = ?session.mode,
                session_status = ?session.status,
                payment_status = ?session.payment_status,
                "class_payments: checkout session not completed"
            );
            return Ok(ClassPaymentOutcome::PaymentIncomplete {
                mode: session.mode,
                status: session.status,
                payment_status: session.payment_status,
            });
        }

        let target = Self::validate_metadata(&session, payer)?;

        match target {
            PaymentTarget::Slot(slot_id) => self.reconcile_slot(slot_id, payer, &session).await,
            PaymentTarget::Class(class_id) => {
                self.reconcile_class(class_id, payer, &session).await
            }
        }
    }

    /// Verifies a Stripe webhook delivery and reconciles completed checkout sessions.
    /// Returns `None` for event types that need no action.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<Option<ClassPaymentOutcome>> {
        let event = self
            .payment_gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                let rejection = ClassPaymentError::InvalidWebhook("signature verification failed");
                warn!(
                    error = %err,
                    status = rejection.status_code().as_u16(),
                    "class_payments: stripe webhook verification failed"
                );
                rejection
            })?;

        debug!(
            event_id = ?event.id,
            event_type = %event.type_,
            livemode = ?event.livemode,
            created = ?event.created,
            "class_payments: stripe webhook signature verified"
        );

        if !HANDLED_WEBHOOK_EVENTS.contains(&event.type_.as_str()) {
            debug!(event_type = %event.type_, "class_payments: ignoring stripe event");
            return Ok(None);
        }

        let session = StripeClient::extract_checkout_session(&event).ok_or_else(|| {
            let err = ClassPaymentError::InvalidWebhook("missing checkout session");
            warn!(
                event_type = %event.type_,
                status = err.status_code().as_u16(),
                "class_payments: checkout session missing in webhook"
            );
            err
        })?;

        let session_id = session
            .id
            .clone()
            .ok_or(ClassPaymentError::InvalidWebhook("missing session id"))?;

        let user_id = session
            .metadata_value("userId")
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| {
                let err = ClassPaymentError::InvalidWebhook("missing userId");
                warn!(
                    %session_id,
                    status = err.status_code().as_u16(),
                    "class_payments: webhook session has no usable userId"
                );
                err
            })?;

        let payer = PayingUser {
            user_id,
            email: session.payer_email().and_then(normalize_email),
            full_name: session
                .customer_details
                .as_ref()
                .and_then(|details| details.name.clone()),
        };

        info!(
            event_type = %event.type_,
            %session_id,
            %user_id,
            "class_payments: reconciling checkout session from webhook"
        );

        self.verify_class_payment(&session_id, &payer).await.map(Some)
    }

    fn validate_metadata(
        session: &StripeCheckoutSession,
        payer: &PayingUser,
    ) -> UseCaseResult<PaymentTarget> {
        let reject = |err: ClassPaymentError| {
            warn!(
                user_id = %payer.user_id,
                session_id = ?session.id,
                status = err.status_code().as_u16(),
                error = %err,
                "class_payments: rejected checkout session metadata"
            );
            err
        };

        let session_user_id = session
            .metadata_value("userId")
            .ok_or_else(|| reject(ClassPaymentError::MissingMetadata("userId")))?;
        let session_user_id = Uuid::parse_str(session_user_id)
            .map_err(|_| reject(ClassPaymentError::InvalidMetadata("userId is not a UUID")))?;

        if session_user_id != payer.user_id {
            return Err(reject(ClassPaymentError::UserMismatch));
        }

        let class_id = session
            .metadata_value("classId")
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| reject(ClassPaymentError::InvalidMetadata("classId is not a UUID")))?;
        let slot_id = session
            .metadata_value("slotId")
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| reject(ClassPaymentError::InvalidMetadata("slotId is not a UUID")))?;

        match (class_id, slot_id) {
            (Some(class_id), None) => Ok(PaymentTarget::Class(class_id)),
            (None, Some(slot_id)) => Ok(PaymentTarget::Slot(slot_id)),
            (None, None) => Err(reject(ClassPaymentError::MissingMetadata(
                "classId or slotId",
            ))),
            (Some(_), Some(_)) => Err(reject(ClassPaymentError::InvalidMetadata(
                "classId and slotId are mutually exclusive",
            ))),
        }
    }

    async fn reconcile_slot(
        &self,
        slot_id: Uuid,
        payer: &PayingUser,
        session: &StripeCheckoutSession,
    ) -> UseCaseResult<ClassPaymentOutcome> {
        let user_id = payer.user_id;

        let existing = self
            .slot_reservation_repo
            .find_by_slot_and_user(slot_id, user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %slot_id,
                    db_error = ?err,
                    "class_payments: failed to look up slot reservation"
                );
                ClassPaymentError::Persistence(err)
            })?;

        if let Some(reservation) = existing {
            info!(
                %user_id,
                %slot_id,
                reservation_id = %reservation.id,
                "class_payments: slot reservation already exists"
            );
            return Ok(ClassPaymentOutcome::SlotReserved {
                reservation_id: reservation.id,
                already_reserved: true,
            });
        }

        let reservation_id = self
            .slot_reservation_repo
            .create(InsertSlotReservationEntity {
                slot_id,
                user_id,
                status: ReservationStatus::Confirmed.to_string(),
                payment_status: PaymentStatus::Paid.to_string(),
                provider_session_ref: session.id.clone(),
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %slot_id,
                    db_error = ?err,
                    "class_payments: failed to create slot reservation"
                );
                ClassPaymentError::Persistence(err)
            })?;

        info!(
            %user_id,
            %slot_id,
            %reservation_id,
            "class_payments: slot reservation created"
        );

        Ok(ClassPaymentOutcome::SlotReserved {
            reservation_id,
            already_reserved: false,
        })
    }

    async fn reconcile_class(
        &self,
        class_id: Uuid,
        payer: &PayingUser,
        session: &StripeCheckoutSession,
    ) -> UseCaseResult<ClassPaymentOutcome> {
        let user_id = payer.user_id;

        let email = payer
            .email
            .as_deref()
            .and_then(normalize_email)
            .ok_or_else(|| {
                let err = ClassPaymentError::MissingEmail;
                warn!(
                    %user_id,
                    %class_id,
                    status = err.status_code().as_u16(),
                    "class_payments: payer has no email"
                );
                err
            })?;

        let class = self
            .class_repo
            .find_by_id(class_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %class_id,
                    db_error = ?err,
                    "class_payments: failed to load class"
                );
                ClassPaymentError::Persistence(err)
            })?
            .ok_or_else(|| {
                let err = ClassPaymentError::ClassNotFound;
                warn!(
                    %user_id,
                    %class_id,
                    status = err.status_code().as_u16(),
                    "class_payments: class referenced by session does not exist"
                );
                err
            })?;

        let enrollments = self
            .enrollment_repo
            .find_by_email_trainer_club(&email, class.trainer_id, class.club_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %class_id,
                    trainer_id = %class.trainer_id,
                    club_id = %class.club_id,
                    db_error = ?err,
                    "class_payments: failed to look up enrollments"
                );
                ClassPaymentError::Persistence(err)
            })?;

        let known_enrollment_ids: Vec<Uuid> = enrollments.iter().map(|e| e.id).collect();

        let enrollment = match enrollments
            .iter()
            .find(|e| EnrollmentStatus::from_str(&e.status) == EnrollmentStatus::Active)
        {
            Some(active) => {
                debug!(
                    %user_id,
                    enrollment_id = %active.id,
                    "class_payments: reusing active enrollment"
                );
                EnrollmentResolution::Existing(active.id)
            }
            None => {
                debug!(%user_id, %class_id, "class_payments: no active enrollment, creating one");
                EnrollmentResolution::New(Self::new_enrollment(&class, &email, payer))
            }
        };

        // Historical duplicates mean the participation can hang off any of the payer's enrollments.
        let existing = self
            .participation_repo
            .find_by_class_and_enrollments(class_id, known_enrollment_ids.clone())
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %class_id,
                    db_error = ?err,
                    "class_payments: failed to look up participation"
                );
                ClassPaymentError::Persistence(err)
            })?;

        let participation = match existing {
            Some(participation) => {
                let settled = PaymentStatus::from_str(&participation.payment_status)
                    .map(|status| status.is_settled())
                    .unwrap_or(false);

                if settled {
                    info!(
                        %user_id,
                        %class_id,
                        participation_id = %participation.id,
                        "class_payments: participation already paid, nothing to do"
                    );
                    return Ok(ClassPaymentOutcome::AlreadyProcessed {
                        participation_id: participation.id,
                    });
                }

                ParticipationResolution::Existing {
                    participation_id: participation.id,
                    enrollment_id: participation.enrollment_id,
                }
            }
            None => ParticipationResolution::New,
        };

        let subscription = if session.is_subscription() {
            Some(self.subscription_snapshot(session, user_id, class_id).await?)
        } else {
            None
        };

        let commit = ClassPaymentCommit {
            class_id,
            enrollment,
            known_enrollment_ids,
            participation,
            subscription,
            payment_method: PAYMENT_METHOD_STRIPE.to_string(),
            paid_at: Utc::now(),
        };

        let recorded = match self
            .participation_repo
            .record_class_payment(commit)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %class_id,
                    db_error = ?err,
                    "class_payments: failed to record class payment"
                );
                ClassPaymentError::Persistence(err)
            })? {
            ClassPaymentCommitResult::Recorded(recorded) => recorded,
            ClassPaymentCommitResult::AlreadyPaid { participation_id } => {
                info!(
                    %user_id,
                    %class_id,
                    %participation_id,
                    "class_payments: concurrent confirmation already recorded this payment"
                );
                return Ok(ClassPaymentOutcome::AlreadyProcessed { participation_id });
            }
        };

        info!(
            %user_id,
            %class_id,
            participation_id = %recorded.participation_id,
            enrollment_id = %recorded.enrollment_id,
            subscription_id = ?recorded.subscription_id,
            enrollment_created = recorded.enrollment_created,
            participation_created = recorded.participation_created,
            "class_payments: participation marked paid"
        );

        self.remove_from_waitlist(class_id, user_id).await;

        Ok(ClassPaymentOutcome::ClassParticipationPaid {
            participation_id: recorded.participation_id,
            enrollment_id: recorded.enrollment_id,
            subscription_id: recorded.subscription_id,
        })
    }

    async fn subscription_snapshot(
        &self,
        session: &StripeCheckoutSession,
        user_id: Uuid,
        class_id: Uuid,
    ) -> UseCaseResult<SubscriptionSnapshot> {
        let subscription_id = session.subscription.clone().ok_or_else(|| {
            let err = ClassPaymentError::InvalidSession("subscription id missing on session");
            warn!(
                %user_id,
                %class_id,
                session_id = ?session.id,
                status = err.status_code().as_u16(),
                "class_payments: subscription-mode session without subscription"
            );
            err
        })?;

        let subscription = self
            .payment_gateway
            .retrieve_subscription(&subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %class_id,
                    %subscription_id,
                    error = ?err,
                    "class_payments: failed to retrieve subscription from stripe"
                );
                ClassPaymentError::Provider(err)
            })?;

        info!(
            %user_id,
            %class_id,
            %subscription_id,
            subscription_status = %subscription.status,
            period_start = ?subscription.period_start(),
            period_end = ?subscription.period_end(),
            "class_payments: stripe subscription retrieved"
        );

        let provider_subscription_id = if subscription.id.is_empty() {
            subscription_id
        } else {
            subscription.id.clone()
        };

        Ok(SubscriptionSnapshot {
            provider_subscription_id,
            provider_customer_id: subscription.customer.clone().or(session.customer.clone()),
            status: subscription.status.clone(),
            current_period_start: subscription.period_start().and_then(ts_to_datetime),
            current_period_end: subscription.period_end().and_then(ts_to_datetime),
            cancel_at_period_end: subscription.cancel_at_period_end,
            canceled_at: subscription.canceled_at.and_then(ts_to_datetime),
        })
    }

    async fn remove_from_waitlist(&self, class_id: Uuid, user_id: Uuid) {
        match self.waitlist_repo.remove_entry(class_id, user_id).await {
            Ok(0) => debug!(%user_id, %class_id, "class_payments: user was not on the waitlist"),
            Ok(removed) => {
                info!(%user_id, %class_id, removed, "class_payments: removed user from waitlist")
            }
            Err(err) => warn!(
                %user_id,
                %class_id,
                db_error = ?err,
                "class_payments: failed to remove user from waitlist, continuing"
            ),
        }
    }

    fn new_enrollment(class: &ClassEntity, email: &str, payer: &PayingUser) -> InsertEnrollmentEntity {
        InsertEnrollmentEntity {
            email: email.to_string(),
            full_name: payer
                .full_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| email.to_string()),
            trainer_id: class.trainer_id,
            club_id: class.club_id,
            status: EnrollmentStatus::Active.to_string(),
            level: PLACEHOLDER_LEVEL.to_string(),
            preferred_days: vec![class.day_of_week.clone()],
            preferred_start_time: Some(class.start_time),
        }
    }
}

fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    (!email.is_empty()).then_some(email)
}

fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

#[cfg(test)]
mod tests;
