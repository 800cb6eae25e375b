use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::enrollments::InsertEnrollmentEntity;

/// Channel tag written to `class_participations.payment_method`.
pub const PAYMENT_METHOD_STRIPE: &str = "stripe";

/// Skill level given to enrollments created on first payment.
pub const PLACEHOLDER_LEVEL: &str = "beginner";

/// The person a checkout session is being reconciled for.
#[derive(Debug, Clone, PartialEq)]
pub struct PayingUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// What a checkout session paid for. `classId` and `slotId` are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Class(Uuid),
    Slot(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentResolution {
    Existing(Uuid),
    New(InsertEnrollmentEntity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipationResolution {
    /// Reused as-is; a subscription attaches to this participation's own enrollment.
    Existing {
        participation_id: Uuid,
        enrollment_id: Uuid,
    },
    New,
}

/// Provider-side subscription fields mirrored into the local `subscriptions` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSnapshot {
    pub provider_subscription_id: String,
    pub provider_customer_id: Option<String>,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Everything the write phase of a class payment needs, decided before any write happens.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPaymentCommit {
    pub class_id: Uuid,
    pub enrollment: EnrollmentResolution,
    /// Every enrollment id known for the payer's (email, trainer, club), any status.
    pub known_enrollment_ids: Vec<Uuid>,
    pub participation: ParticipationResolution,
    pub subscription: Option<SubscriptionSnapshot>,
    pub payment_method: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClassPayment {
    pub participation_id: Uuid,
    /// The enrollment the participation belongs to.
    pub enrollment_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub enrollment_created: bool,
    pub participation_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassPaymentCommitResult {
    Recorded(RecordedClassPayment),
    /// A concurrent confirmation got there first; nothing was written.
    AlreadyPaid { participation_id: Uuid },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyClassPaymentRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationType {
    SlotReservation,
    ClassParticipation,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassPaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_participation_id: Option<Uuid>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<ReconciliationType>,
}
