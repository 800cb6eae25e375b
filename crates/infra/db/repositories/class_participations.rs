use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    Connection, PgConnection, RunQueryDsl, insert_into,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    update,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{class_participations, enrollments, subscriptions},
        sql_functions::lower,
    },
};
use domain::{
    entities::{
        class_participations::{
            ClassParticipationEntity, InsertClassParticipationEntity, MarkParticipationPaidEntity,
        },
        enrollments::InsertEnrollmentEntity,
        subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    },
    repositories::class_participations::ClassParticipationRepository,
    value_objects::{
        class_payments::{
            ClassPaymentCommit, ClassPaymentCommitResult, EnrollmentResolution,
            ParticipationResolution, RecordedClassPayment, SubscriptionSnapshot,
        },
        enums::{
            enrollment_statuses::EnrollmentStatus, participation_statuses::ParticipationStatus,
            payment_statuses::PaymentStatus,
        },
    },
};

pub struct ClassParticipationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ClassParticipationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ClassParticipationRepository for ClassParticipationPostgres {
    async fn find_by_class_and_enrollments(
        &self,
        class_id: Uuid,
        enrollment_ids: Vec<Uuid>,
    ) -> Result<Option<ClassParticipationEntity>> {
        if enrollment_ids.is_empty() {
            return Ok(None);
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;
        find_participation(&mut conn, class_id, &enrollment_ids)
    }

    async fn record_class_payment(
        &self,
        commit: ClassPaymentCommit,
    ) -> Result<ClassPaymentCommitResult> {
        let mut pooled = Arc::clone(&self.db_pool).get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, anyhow::Error, _>(|conn| record_class_payment_tx(conn, &commit))
    }
}

fn record_class_payment_tx(
    conn: &mut PgConnection,
    commit: &ClassPaymentCommit,
) -> Result<ClassPaymentCommitResult> {
    let mut participation = commit.participation;

    // Final duplicate check, inside the transaction, before anything is written.
    if participation == ParticipationResolution::New {
        if let Some(existing) =
            find_participation(conn, commit.class_id, &commit.known_enrollment_ids)?
        {
            if is_settled(&existing) {
                return Ok(ClassPaymentCommitResult::AlreadyPaid {
                    participation_id: existing.id,
                });
            }
            participation = ParticipationResolution::Existing {
                participation_id: existing.id,
                enrollment_id: existing.enrollment_id,
            };
        }
    }

    let (resolved_enrollment_id, enrollment_created) = match &commit.enrollment {
        EnrollmentResolution::Existing(id) => (*id, false),
        EnrollmentResolution::New(new_enrollment) => insert_enrollment(conn, new_enrollment)?,
    };

    let (participation_id, enrollment_id, participation_created) = match participation {
        ParticipationResolution::Existing {
            participation_id,
            enrollment_id,
        } => (participation_id, enrollment_id, false),
        ParticipationResolution::New => {
            let inserted = insert_into(class_participations::table)
                .values(&InsertClassParticipationEntity {
                    class_id: commit.class_id,
                    enrollment_id: resolved_enrollment_id,
                    status: ParticipationStatus::Active.to_string(),
                    payment_status: PaymentStatus::Pending.to_string(),
                    payment_verified: false,
                })
                .on_conflict((
                    class_participations::class_id,
                    class_participations::enrollment_id,
                ))
                .do_nothing()
                .returning(class_participations::id)
                .get_result::<Uuid>(conn)
                .optional()?;

            match inserted {
                Some(id) => (id, resolved_enrollment_id, true),
                None => {
                    let existing =
                        find_participation(conn, commit.class_id, &[resolved_enrollment_id])?
                        .context("participation insert conflicted but no existing row was found")?;
                    if is_settled(&existing) {
                        return Ok(ClassPaymentCommitResult::AlreadyPaid {
                            participation_id: existing.id,
                        });
                    }
                    (existing.id, existing.enrollment_id, false)
                }
            }
        }
    };

    let subscription_id = match &commit.subscription {
        Some(snapshot) => Some(upsert_subscription(
            conn,
            enrollment_id,
            commit.class_id,
            snapshot,
        )?),
        None => None,
    };

    update(class_participations::table)
        .filter(class_participations::id.eq(participation_id))
        .set(&MarkParticipationPaidEntity {
            status: ParticipationStatus::Active.to_string(),
            payment_status: PaymentStatus::Paid.to_string(),
            payment_verified: true,
            payment_method: commit.payment_method.clone(),
            paid_at: commit.paid_at,
            subscription_id,
            updated_at: Utc::now(),
        })
        .execute(conn)?;

    Ok(ClassPaymentCommitResult::Recorded(RecordedClassPayment {
        participation_id,
        enrollment_id,
        subscription_id,
        enrollment_created,
        participation_created,
    }))
}

fn find_participation(
    conn: &mut PgConnection,
    class_id: Uuid,
    enrollment_ids: &[Uuid],
) -> Result<Option<ClassParticipationEntity>> {
    if enrollment_ids.is_empty() {
        return Ok(None);
    }

    let participation = class_participations::table
        .filter(class_participations::class_id.eq(class_id))
        .filter(class_participations::enrollment_id.eq_any(enrollment_ids))
        .order(class_participations::created_at.asc())
        .select(ClassParticipationEntity::as_select())
        .first::<ClassParticipationEntity>(conn)
        .optional()?;

    Ok(participation)
}

fn is_settled(participation: &ClassParticipationEntity) -> bool {
    PaymentStatus::from_str(&participation.payment_status)
        .map(|status| status.is_settled())
        .unwrap_or(false)
}

/// Inserts under a savepoint so a unique violation on the active-enrollment index can fall
/// back to the row that won.
fn insert_enrollment(
    conn: &mut PgConnection,
    new_enrollment: &InsertEnrollmentEntity,
) -> Result<(Uuid, bool)> {
    let attempt = conn.transaction::<Uuid, DieselError, _>(|conn| {
        insert_into(enrollments::table)
            .values(new_enrollment)
            .returning(enrollments::id)
            .get_result::<Uuid>(conn)
    });

    match attempt {
        Ok(id) => Ok((id, true)),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            let id = enrollments::table
                .filter(lower(enrollments::email).eq(new_enrollment.email.to_lowercase()))
                .filter(enrollments::trainer_id.eq(new_enrollment.trainer_id))
                .filter(enrollments::club_id.eq(new_enrollment.club_id))
                .filter(enrollments::status.eq(EnrollmentStatus::Active.to_string()))
                .select(enrollments::id)
                .first::<Uuid>(conn)?;
            Ok((id, false))
        }
        Err(err) => Err(err.into()),
    }
}

fn upsert_subscription(
    conn: &mut PgConnection,
    enrollment_id: Uuid,
    class_id: Uuid,
    snapshot: &SubscriptionSnapshot,
) -> Result<Uuid> {
    let inserted = insert_into(subscriptions::table)
        .values(&InsertSubscriptionEntity {
            enrollment_id,
            class_id,
            provider_subscription_id: snapshot.provider_subscription_id.clone(),
            provider_customer_id: snapshot.provider_customer_id.clone(),
            status: snapshot.status.clone(),
            current_period_start: snapshot.current_period_start,
            current_period_end: snapshot.current_period_end,
            cancel_at_period_end: snapshot.cancel_at_period_end,
            canceled_at: snapshot.canceled_at,
        })
        .on_conflict(subscriptions::provider_subscription_id)
        .do_nothing()
        .returning(subscriptions::id)
        .get_result::<Uuid>(conn)
        .optional()?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    let existing = subscriptions::table
        .filter(subscriptions::provider_subscription_id.eq(&snapshot.provider_subscription_id))
        .select(SubscriptionEntity::as_select())
        .first::<SubscriptionEntity>(conn)?;

    if existing.enrollment_id != enrollment_id || existing.class_id != class_id {
        warn!(
            subscription_id = %existing.id,
            provider_subscription_id = %existing.provider_subscription_id,
            existing_enrollment_id = %existing.enrollment_id,
            %enrollment_id,
            "class_participations: provider subscription already linked elsewhere, reusing it"
        );
    }

    Ok(existing.id)
}
