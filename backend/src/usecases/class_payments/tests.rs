use super::*;

use std::{collections::HashMap, sync::Mutex};

use chrono::{NaiveDate, NaiveTime};
use crates::domain::{
    entities::{
        class_participations::ClassParticipationEntity, enrollments::EnrollmentEntity,
        slot_reservations::SlotReservationEntity,
    },
    repositories::{
        class_participations::MockClassParticipationRepository, classes::MockClassRepository,
        enrollments::MockEnrollmentRepository, slot_reservations::MockSlotReservationRepository,
        waitlist::MockWaitlistRepository,
    },
    value_objects::class_payments::RecordedClassPayment,
};
use crates::payments::stripe_client::{StripeCustomerDetails, StripeEventData};

const USER: Uuid = Uuid::from_u128(0x11);
const OTHER_USER: Uuid = Uuid::from_u128(0x12);
const CLASS: Uuid = Uuid::from_u128(0x21);
const SLOT: Uuid = Uuid::from_u128(0x31);
const TRAINER: Uuid = Uuid::from_u128(0x41);
const CLUB: Uuid = Uuid::from_u128(0x51);
const ENROLLMENT: Uuid = Uuid::from_u128(0x61);
const OLD_ENROLLMENT: Uuid = Uuid::from_u128(0x62);
const PARTICIPATION: Uuid = Uuid::from_u128(0x71);
const SUBSCRIPTION: Uuid = Uuid::from_u128(0x81);
const RESERVATION: Uuid = Uuid::from_u128(0x91);

type TestUseCase<P> = ClassPaymentUseCase<
    MockClassRepository,
    MockEnrollmentRepository,
    P,
    MockWaitlistRepository,
    MockSlotReservationRepository,
    MockPaymentGateway,
>;

struct Mocks {
    classes: MockClassRepository,
    enrollments: MockEnrollmentRepository,
    participations: MockClassParticipationRepository,
    waitlist: MockWaitlistRepository,
    slots: MockSlotReservationRepository,
    gateway: MockPaymentGateway,
}

impl Mocks {
    fn new() -> Self {
        Self {
            classes: MockClassRepository::new(),
            enrollments: MockEnrollmentRepository::new(),
            participations: MockClassParticipationRepository::new(),
            waitlist: MockWaitlistRepository::new(),
            slots: MockSlotReservationRepository::new(),
            gateway: MockPaymentGateway::new(),
        }
    }

    fn into_usecase(self) -> TestUseCase<MockClassParticipationRepository> {
        ClassPaymentUseCase::new(
            Arc::new(self.classes),
            Arc::new(self.enrollments),
            Arc::new(self.participations),
            Arc::new(self.waitlist),
            Arc::new(self.slots),
            Arc::new(self.gateway),
        )
    }
}

fn payer() -> PayingUser {
    PayingUser {
        user_id: USER,
        email: Some("Ana@Example.com".to_string()),
        full_name: Some("Ana Lopez".to_string()),
    }
}

fn session(mode: &str, metadata: &[(&str, String)]) -> StripeCheckoutSession {
    StripeCheckoutSession {
        id: Some("cs_test_1".to_string()),
        mode: Some(mode.to_string()),
        status: Some("complete".to_string()),
        payment_status: Some("paid".to_string()),
        subscription: (mode == "subscription").then(|| "sub_1".to_string()),
        customer: Some("cus_1".to_string()),
        customer_email: None,
        customer_details: None,
        metadata: Some(
            metadata
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

fn class_session(mode: &str) -> StripeCheckoutSession {
    session(
        mode,
        &[("userId", USER.to_string()), ("classId", CLASS.to_string())],
    )
}

fn class_entity() -> ClassEntity {
    ClassEntity {
        id: CLASS,
        club_id: CLUB,
        trainer_id: TRAINER,
        name: "Padel Intermedio - Court 1".to_string(),
        level_from: 3,
        level_to: 5,
        day_of_week: "monday".to_string(),
        start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        duration_minutes: 60,
        court_number: 1,
        capacity: 4,
        monthly_price_minor: 4500,
        valid_from: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        valid_until: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        is_active: true,
        created_at: Utc::now(),
    }
}

fn enrollment(id: Uuid, status: EnrollmentStatus) -> EnrollmentEntity {
    EnrollmentEntity {
        id,
        email: "ana@example.com".to_string(),
        full_name: "Ana Lopez".to_string(),
        trainer_id: TRAINER,
        club_id: CLUB,
        status: status.to_string(),
        level: "beginner".to_string(),
        preferred_days: vec!["monday".to_string()],
        preferred_start_time: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn participation(enrollment_id: Uuid, payment_status: PaymentStatus) -> ClassParticipationEntity {
    ClassParticipationEntity {
        id: PARTICIPATION,
        class_id: CLASS,
        enrollment_id,
        status: "active".to_string(),
        payment_status: payment_status.to_string(),
        payment_verified: payment_status.is_settled(),
        payment_method: None,
        paid_at: None,
        subscription_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn recorded(enrollment_id: Uuid, subscription_id: Option<Uuid>) -> RecordedClassPayment {
    RecordedClassPayment {
        participation_id: PARTICIPATION,
        enrollment_id,
        subscription_id,
        enrollment_created: false,
        participation_created: true,
    }
}

fn expect_session(mocks: &mut Mocks, session: StripeCheckoutSession) {
    mocks
        .gateway
        .expect_retrieve_checkout_session()
        .withf(|session_id| session_id == "cs_test_1")
        .times(1)
        .returning(move |_| Ok(session.clone()));
}

fn expect_class(mocks: &mut Mocks) {
    mocks
        .classes
        .expect_find_by_id()
        .withf(|class_id| class_id == &CLASS)
        .times(1)
        .returning(|_| Ok(Some(class_entity())));
}

fn expect_enrollments(mocks: &mut Mocks, found: Vec<EnrollmentEntity>) {
    mocks
        .enrollments
        .expect_find_by_email_trainer_club()
        .withf(|email, trainer_id, club_id| {
            email.eq("ana@example.com") && trainer_id == &TRAINER && club_id == &CLUB
        })
        .times(1)
        .returning(move |_, _, _| Ok(found.clone()));
}

fn expect_no_participation(mocks: &mut Mocks) {
    mocks
        .participations
        .expect_find_by_class_and_enrollments()
        .times(1)
        .returning(|_, _| Ok(None));
}

fn expect_waitlist_cleanup(mocks: &mut Mocks) {
    mocks
        .waitlist
        .expect_remove_entry()
        .withf(|class_id, user_id| class_id == &CLASS && user_id == &USER)
        .times(1)
        .returning(|_, _| Ok(1));
}

#[tokio::test]
async fn blank_session_id_is_rejected_before_calling_stripe() {
    let mut mocks = Mocks::new();
    mocks.gateway.expect_retrieve_checkout_session().times(0);

    let result = mocks.into_usecase().verify_class_payment("   ", &payer()).await;

    assert!(matches!(result, Err(ClassPaymentError::MissingSessionId)));
}

#[tokio::test]
async fn unpaid_one_time_session_writes_nothing() {
    let mut mocks = Mocks::new();
    let mut unpaid = class_session("payment");
    unpaid.payment_status = Some("unpaid".to_string());
    expect_session(&mut mocks, unpaid);
    mocks.classes.expect_find_by_id().times(0);
    mocks.participations.expect_record_class_payment().times(0);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::PaymentIncomplete {
            mode: Some("payment".to_string()),
            status: Some("complete".to_string()),
            payment_status: Some("unpaid".to_string()),
        }
    );
}

#[tokio::test]
async fn open_subscription_session_writes_nothing() {
    let mut mocks = Mocks::new();
    let mut open = class_session("subscription");
    open.status = Some("open".to_string());
    expect_session(&mut mocks, open);
    mocks.gateway.expect_retrieve_subscription().times(0);
    mocks.participations.expect_record_class_payment().times(0);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert!(matches!(outcome, ClassPaymentOutcome::PaymentIncomplete { .. }));
}

#[tokio::test]
async fn provider_failure_surfaces_as_provider_error() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_retrieve_checkout_session()
        .returning(|_| Err(anyhow::anyhow!("stripe unavailable")));

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::Provider(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn missing_user_id_metadata_is_rejected() {
    let mut mocks = Mocks::new();
    expect_session(
        &mut mocks,
        session("payment", &[("classId", CLASS.to_string())]),
    );

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::MissingMetadata("userId")));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_for_another_user_is_unauthorized() {
    let mut mocks = Mocks::new();
    expect_session(
        &mut mocks,
        session(
            "payment",
            &[
                ("userId", OTHER_USER.to_string()),
                ("classId", CLASS.to_string()),
            ],
        ),
    );
    mocks.classes.expect_find_by_id().times(0);

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::UserMismatch));
    assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_without_target_is_rejected() {
    let mut mocks = Mocks::new();
    expect_session(
        &mut mocks,
        session("payment", &[("userId", USER.to_string())]),
    );

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::MissingMetadata(_)));
}

#[tokio::test]
async fn session_with_both_class_and_slot_is_rejected() {
    let mut mocks = Mocks::new();
    expect_session(
        &mut mocks,
        session(
            "payment",
            &[
                ("userId", USER.to_string()),
                ("classId", CLASS.to_string()),
                ("slotId", SLOT.to_string()),
            ],
        ),
    );
    mocks.slots.expect_find_by_slot_and_user().times(0);
    mocks.classes.expect_find_by_id().times(0);

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::InvalidMetadata(_)));
}

#[tokio::test]
async fn malformed_class_id_is_rejected() {
    let mut mocks = Mocks::new();
    expect_session(
        &mut mocks,
        session(
            "payment",
            &[
                ("userId", USER.to_string()),
                ("classId", "not-a-uuid".to_string()),
            ],
        ),
    );

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::InvalidMetadata(_)));
}

#[tokio::test]
async fn slot_payment_creates_confirmed_reservation() {
    let mut mocks = Mocks::new();
    expect_session(
        &mut mocks,
        session(
            "payment",
            &[("userId", USER.to_string()), ("slotId", SLOT.to_string())],
        ),
    );
    mocks
        .slots
        .expect_find_by_slot_and_user()
        .withf(|slot_id, user_id| slot_id == &SLOT && user_id == &USER)
        .times(1)
        .returning(|_, _| Ok(None));
    mocks
        .slots
        .expect_create()
        .withf(|reservation| {
            reservation.slot_id == SLOT
                && reservation.user_id == USER
                && reservation.status == "confirmed"
                && reservation.payment_status == "paid"
                && reservation.provider_session_ref.as_deref() == Some("cs_test_1")
        })
        .times(1)
        .returning(|_| Ok(RESERVATION));
    mocks.participations.expect_record_class_payment().times(0);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::SlotReserved {
            reservation_id: RESERVATION,
            already_reserved: false,
        }
    );
}

#[tokio::test]
async fn slot_payment_reuses_existing_reservation() {
    let mut mocks = Mocks::new();
    expect_session(
        &mut mocks,
        session(
            "payment",
            &[("userId", USER.to_string()), ("slotId", SLOT.to_string())],
        ),
    );
    mocks
        .slots
        .expect_find_by_slot_and_user()
        .returning(|slot_id, user_id| {
            Ok(Some(SlotReservationEntity {
                id: RESERVATION,
                slot_id,
                user_id,
                status: "confirmed".to_string(),
                payment_status: "paid".to_string(),
                provider_session_ref: Some("cs_test_1".to_string()),
                created_at: Utc::now(),
            }))
        });
    mocks.slots.expect_create().times(0);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::SlotReserved {
            reservation_id: RESERVATION,
            already_reserved: true,
        }
    );
}

#[tokio::test]
async fn class_payment_without_email_is_rejected() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    mocks.classes.expect_find_by_id().times(0);

    let mut no_email = payer();
    no_email.email = Some("  ".to_string());

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &no_email)
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::MissingEmail));
}

#[tokio::test]
async fn unknown_class_is_rejected() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    mocks.classes.expect_find_by_id().returning(|_| Ok(None));
    mocks.enrollments.expect_find_by_email_trainer_club().times(0);

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::ClassNotFound));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn first_payment_creates_enrollment_from_class() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, Vec::new());
    expect_no_participation(&mut mocks);
    mocks.gateway.expect_retrieve_subscription().times(0);
    mocks
        .participations
        .expect_record_class_payment()
        .times(1)
        .returning(|commit| {
            let EnrollmentResolution::New(ref new_enrollment) = commit.enrollment else {
                panic!("expected a new enrollment, got {:?}", commit.enrollment);
            };
            assert_eq!(new_enrollment.email, "ana@example.com");
            assert_eq!(new_enrollment.full_name, "Ana Lopez");
            assert_eq!(new_enrollment.trainer_id, TRAINER);
            assert_eq!(new_enrollment.club_id, CLUB);
            assert_eq!(new_enrollment.status, "active");
            assert_eq!(new_enrollment.level, PLACEHOLDER_LEVEL);
            assert_eq!(new_enrollment.preferred_days, vec!["monday".to_string()]);
            assert_eq!(
                new_enrollment.preferred_start_time,
                NaiveTime::from_hms_opt(18, 0, 0)
            );
            assert_eq!(commit.participation, ParticipationResolution::New);
            assert!(commit.known_enrollment_ids.is_empty());
            assert!(commit.subscription.is_none());
            assert_eq!(commit.payment_method, PAYMENT_METHOD_STRIPE);

            let mut result = recorded(ENROLLMENT, None);
            result.enrollment_created = true;
            Ok(ClassPaymentCommitResult::Recorded(result))
        });
    expect_waitlist_cleanup(&mut mocks);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::ClassParticipationPaid {
            participation_id: PARTICIPATION,
            enrollment_id: ENROLLMENT,
            subscription_id: None,
        }
    );
}

#[tokio::test]
async fn new_enrollment_falls_back_to_email_for_name() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, Vec::new());
    expect_no_participation(&mut mocks);
    mocks
        .participations
        .expect_record_class_payment()
        .withf(|commit| {
            matches!(
                &commit.enrollment,
                EnrollmentResolution::New(new_enrollment)
                    if new_enrollment.full_name == "ana@example.com"
            )
        })
        .times(1)
        .returning(|_| Ok(ClassPaymentCommitResult::Recorded(recorded(ENROLLMENT, None))));
    expect_waitlist_cleanup(&mut mocks);

    let mut nameless = payer();
    nameless.full_name = None;

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &nameless)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ClassPaymentOutcome::ClassParticipationPaid { .. }
    ));
}

#[tokio::test]
async fn active_enrollment_is_reused_and_all_enrollments_are_searched() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    expect_class(&mut mocks);
    expect_enrollments(
        &mut mocks,
        vec![
            enrollment(OLD_ENROLLMENT, EnrollmentStatus::Inactive),
            enrollment(ENROLLMENT, EnrollmentStatus::Active),
        ],
    );
    mocks
        .participations
        .expect_find_by_class_and_enrollments()
        .withf(|class_id, enrollment_ids| {
            class_id == &CLASS
                && enrollment_ids.len() == 2
                && enrollment_ids.contains(&OLD_ENROLLMENT)
                && enrollment_ids.contains(&ENROLLMENT)
        })
        .times(1)
        .returning(|_, _| Ok(None));
    mocks
        .participations
        .expect_record_class_payment()
        .withf(|commit| {
            commit.enrollment == EnrollmentResolution::Existing(ENROLLMENT)
                && commit.known_enrollment_ids == vec![OLD_ENROLLMENT, ENROLLMENT]
        })
        .times(1)
        .returning(|_| Ok(ClassPaymentCommitResult::Recorded(recorded(ENROLLMENT, None))));
    expect_waitlist_cleanup(&mut mocks);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ClassPaymentOutcome::ClassParticipationPaid {
            enrollment_id: ENROLLMENT,
            ..
        }
    ));
}

#[tokio::test]
async fn pending_participation_on_old_enrollment_is_reused() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    expect_class(&mut mocks);
    expect_enrollments(
        &mut mocks,
        vec![
            enrollment(OLD_ENROLLMENT, EnrollmentStatus::Inactive),
            enrollment(ENROLLMENT, EnrollmentStatus::Active),
        ],
    );
    mocks
        .participations
        .expect_find_by_class_and_enrollments()
        .returning(|_, _| Ok(Some(participation(OLD_ENROLLMENT, PaymentStatus::Pending))));
    mocks
        .participations
        .expect_record_class_payment()
        .withf(|commit| {
            commit.participation
                == ParticipationResolution::Existing {
                    participation_id: PARTICIPATION,
                    enrollment_id: OLD_ENROLLMENT,
                }
        })
        .times(1)
        .returning(|_| {
            let mut result = recorded(OLD_ENROLLMENT, None);
            result.participation_created = false;
            Ok(ClassPaymentCommitResult::Recorded(result))
        });
    expect_waitlist_cleanup(&mut mocks);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::ClassParticipationPaid {
            participation_id: PARTICIPATION,
            enrollment_id: OLD_ENROLLMENT,
            subscription_id: None,
        }
    );
}

#[tokio::test]
async fn already_paid_participation_short_circuits() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("subscription"));
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, vec![enrollment(ENROLLMENT, EnrollmentStatus::Active)]);
    mocks
        .participations
        .expect_find_by_class_and_enrollments()
        .returning(|_, _| Ok(Some(participation(ENROLLMENT, PaymentStatus::Verified))));
    mocks.gateway.expect_retrieve_subscription().times(0);
    mocks.participations.expect_record_class_payment().times(0);
    mocks.waitlist.expect_remove_entry().times(0);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::AlreadyProcessed {
            participation_id: PARTICIPATION
        }
    );
}

#[tokio::test]
async fn concurrent_confirmation_reports_already_processed() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, vec![enrollment(ENROLLMENT, EnrollmentStatus::Active)]);
    expect_no_participation(&mut mocks);
    mocks
        .participations
        .expect_record_class_payment()
        .returning(|_| {
            Ok(ClassPaymentCommitResult::AlreadyPaid {
                participation_id: PARTICIPATION,
            })
        });
    mocks.waitlist.expect_remove_entry().times(0);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::AlreadyProcessed {
            participation_id: PARTICIPATION
        }
    );
}

#[tokio::test]
async fn subscription_session_links_subscription_snapshot() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("subscription"));
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, vec![enrollment(ENROLLMENT, EnrollmentStatus::Active)]);
    expect_no_participation(&mut mocks);
    mocks
        .gateway
        .expect_retrieve_subscription()
        .withf(|subscription_id| subscription_id == "sub_1")
        .times(1)
        .returning(|_| {
            Ok(StripeSubscription {
                id: "sub_1".to_string(),
                customer: None,
                status: "active".to_string(),
                current_period_start: Some(1_756_684_800),
                current_period_end: Some(1_759_276_800),
                ..Default::default()
            })
        });
    mocks
        .participations
        .expect_record_class_payment()
        .times(1)
        .returning(|commit| {
            let snapshot = commit.subscription.expect("subscription snapshot");
            assert_eq!(snapshot.provider_subscription_id, "sub_1");
            assert_eq!(snapshot.provider_customer_id.as_deref(), Some("cus_1"));
            assert_eq!(snapshot.status, "active");
            assert_eq!(
                snapshot.current_period_start,
                Utc.timestamp_opt(1_756_684_800, 0).single()
            );
            assert_eq!(
                snapshot.current_period_end,
                Utc.timestamp_opt(1_759_276_800, 0).single()
            );
            assert!(!snapshot.cancel_at_period_end);
            assert!(snapshot.canceled_at.is_none());
            Ok(ClassPaymentCommitResult::Recorded(recorded(
                ENROLLMENT,
                Some(SUBSCRIPTION),
            )))
        });
    expect_waitlist_cleanup(&mut mocks);

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ClassPaymentOutcome::ClassParticipationPaid {
            participation_id: PARTICIPATION,
            enrollment_id: ENROLLMENT,
            subscription_id: Some(SUBSCRIPTION),
        }
    );
}

#[tokio::test]
async fn subscription_session_without_subscription_id_is_rejected() {
    let mut mocks = Mocks::new();
    let mut broken = class_session("subscription");
    broken.subscription = None;
    expect_session(&mut mocks, broken);
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, Vec::new());
    expect_no_participation(&mut mocks);
    mocks.participations.expect_record_class_payment().times(0);

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::InvalidSession(_)));
}

#[tokio::test]
async fn waitlist_failure_does_not_fail_the_payment() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, vec![enrollment(ENROLLMENT, EnrollmentStatus::Active)]);
    expect_no_participation(&mut mocks);
    mocks
        .participations
        .expect_record_class_payment()
        .returning(|_| Ok(ClassPaymentCommitResult::Recorded(recorded(ENROLLMENT, None))));
    mocks
        .waitlist
        .expect_remove_entry()
        .times(1)
        .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

    let outcome = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ClassPaymentOutcome::ClassParticipationPaid { .. }
    ));
}

#[tokio::test]
async fn failed_commit_is_a_persistence_error() {
    let mut mocks = Mocks::new();
    expect_session(&mut mocks, class_session("payment"));
    expect_class(&mut mocks);
    expect_enrollments(&mut mocks, Vec::new());
    expect_no_participation(&mut mocks);
    mocks
        .participations
        .expect_record_class_payment()
        .returning(|_| Err(anyhow::anyhow!("transaction rolled back")));
    mocks.waitlist.expect_remove_entry().times(0);

    let err = mocks
        .into_usecase()
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::Persistence(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
}

/// Stateful participation store standing in for the transactional repository.
#[derive(Default)]
struct InMemoryParticipations {
    row: Mutex<Option<ClassParticipationEntity>>,
    commits: Mutex<usize>,
}

#[async_trait]
impl ClassParticipationRepository for InMemoryParticipations {
    async fn find_by_class_and_enrollments(
        &self,
        class_id: Uuid,
        enrollment_ids: Vec<Uuid>,
    ) -> anyhow::Result<Option<ClassParticipationEntity>> {
        let row = self.row.lock().unwrap();
        Ok(row
            .clone()
            .filter(|p| p.class_id == class_id && enrollment_ids.contains(&p.enrollment_id)))
    }

    async fn record_class_payment(
        &self,
        commit: ClassPaymentCommit,
    ) -> anyhow::Result<ClassPaymentCommitResult> {
        *self.commits.lock().unwrap() += 1;
        let enrollment_id = match commit.enrollment {
            EnrollmentResolution::Existing(id) => id,
            EnrollmentResolution::New(_) => ENROLLMENT,
        };
        let mut paid = participation(enrollment_id, PaymentStatus::Paid);
        paid.payment_method = Some(commit.payment_method);
        paid.paid_at = Some(commit.paid_at);
        *self.row.lock().unwrap() = Some(paid);

        Ok(ClassPaymentCommitResult::Recorded(RecordedClassPayment {
            enrollment_created: matches!(commit.enrollment, EnrollmentResolution::New(_)),
            ..recorded(enrollment_id, None)
        }))
    }
}

#[tokio::test]
async fn verifying_the_same_session_twice_records_once() {
    let participations = Arc::new(InMemoryParticipations::default());

    let mut classes = MockClassRepository::new();
    classes
        .expect_find_by_id()
        .times(2)
        .returning(|_| Ok(Some(class_entity())));

    let mut enrollments = MockEnrollmentRepository::new();
    enrollments
        .expect_find_by_email_trainer_club()
        .times(2)
        .returning(|_, _, _| Ok(vec![enrollment(ENROLLMENT, EnrollmentStatus::Active)]));

    let mut waitlist = MockWaitlistRepository::new();
    waitlist.expect_remove_entry().times(1).returning(|_, _| Ok(0));

    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_retrieve_checkout_session()
        .times(2)
        .returning(|_| Ok(class_session("payment")));

    let usecase: TestUseCase<InMemoryParticipations> = ClassPaymentUseCase::new(
        Arc::new(classes),
        Arc::new(enrollments),
        Arc::clone(&participations),
        Arc::new(waitlist),
        Arc::new(MockSlotReservationRepository::new()),
        Arc::new(gateway),
    );

    let first = usecase
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();
    let second = usecase
        .verify_class_payment("cs_test_1", &payer())
        .await
        .unwrap();

    assert!(matches!(
        first,
        ClassPaymentOutcome::ClassParticipationPaid { .. }
    ));
    assert_eq!(
        second,
        ClassPaymentOutcome::AlreadyProcessed {
            participation_id: PARTICIPATION
        }
    );
    assert_eq!(*participations.commits.lock().unwrap(), 1);
}

fn webhook_event(type_: &str, object: serde_json::Value) -> StripeEvent {
    StripeEvent {
        id: Some("evt_1".to_string()),
        type_: type_.to_string(),
        created: None,
        livemode: Some(false),
        data: StripeEventData { object },
    }
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_verify_webhook_signature()
        .returning(|_, _| Err(anyhow::anyhow!("signature mismatch")));
    mocks.gateway.expect_retrieve_checkout_session().times(0);

    let err = mocks
        .into_usecase()
        .handle_stripe_webhook(b"{}", "t=1,v1=deadbeef")
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::InvalidWebhook(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_ignores_unrelated_events() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_verify_webhook_signature()
        .returning(|_, _| {
            Ok(webhook_event(
                "invoice.paid",
                serde_json::json!({ "id": "in_1" }),
            ))
        });
    mocks.gateway.expect_retrieve_checkout_session().times(0);

    let outcome = mocks
        .into_usecase()
        .handle_stripe_webhook(b"{}", "t=1,v1=ok")
        .await
        .unwrap();

    assert!(outcome.is_none());
}

#[tokio::test]
async fn completed_checkout_webhook_reconciles_slot() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_verify_webhook_signature()
        .returning(|_, _| {
            Ok(webhook_event(
                "checkout.session.completed",
                serde_json::json!({
                    "id": "cs_test_1",
                    "mode": "payment",
                    "payment_status": "paid",
                    "customer_details": { "email": "ANA@example.com", "name": "Ana Lopez" },
                    "metadata": { "userId": USER.to_string(), "slotId": SLOT.to_string() }
                }),
            ))
        });
    let mut from_api = session(
        "payment",
        &[("userId", USER.to_string()), ("slotId", SLOT.to_string())],
    );
    from_api.customer_details = Some(StripeCustomerDetails {
        email: Some("ana@example.com".to_string()),
        name: Some("Ana Lopez".to_string()),
    });
    expect_session(&mut mocks, from_api);
    mocks
        .slots
        .expect_find_by_slot_and_user()
        .returning(|_, _| Ok(None));
    mocks.slots.expect_create().times(1).returning(|_| Ok(RESERVATION));

    let outcome = mocks
        .into_usecase()
        .handle_stripe_webhook(b"{}", "t=1,v1=ok")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Some(ClassPaymentOutcome::SlotReserved {
            reservation_id: RESERVATION,
            already_reserved: false,
        })
    );
}

#[tokio::test]
async fn webhook_session_without_user_is_rejected() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_verify_webhook_signature()
        .returning(|_, _| {
            Ok(webhook_event(
                "checkout.session.completed",
                serde_json::json!({ "id": "cs_test_1", "metadata": {} }),
            ))
        });
    mocks.gateway.expect_retrieve_checkout_session().times(0);

    let err = mocks
        .into_usecase()
        .handle_stripe_webhook(b"{}", "t=1,v1=ok")
        .await
        .unwrap_err();

    assert!(matches!(err, ClassPaymentError::InvalidWebhook(_)));
}
