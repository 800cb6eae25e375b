use std::sync::Arc;

use chrono::{NaiveTime, Timelike};
use crates::domain::{
    entities::classes::InsertClassEntity,
    repositories::classes::ClassRepository,
    value_objects::class_generation::{
        BulkClassCreatedDto, BulkClassPreviewDto, BulkClassRequest, ClassMultiplication,
        ClassTemplate, GeneratedClass, TimeWindow, TimeWindowModel,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

/// Expands a recurrence description into concrete class instances.
///
/// Output order is day, then window, then start time ascending, then court, each following
/// input order. An empty day, window, court or trainer list yields no instances. A window whose
/// end is not after its start, or whose interval is zero, contributes nothing; a step that
/// would start at or after the window end is never emitted. Trainers are assigned by court
/// position, wrapping around the trainer list.
pub fn generate_class_instances(
    template: &ClassTemplate,
    multiplication: &ClassMultiplication,
) -> Vec<GeneratedClass> {
    let ClassMultiplication {
        days,
        windows,
        courts,
        trainer_ids,
    } = multiplication;

    if trainer_ids.is_empty() {
        return Vec::new();
    }

    let mut generated = Vec::new();

    for day in days {
        for window in windows {
            for start_time in window_start_times(window) {
                for (court_index, court) in courts.iter().enumerate() {
                    generated.push(GeneratedClass {
                        name: format!("{} - Court {}", template.name, court),
                        club_id: template.club_id,
                        trainer_id: trainer_ids[court_index % trainer_ids.len()],
                        day_of_week: *day,
                        start_time,
                        duration_minutes: template.duration_minutes,
                        court_number: *court,
                        level_from: template.level_from,
                        level_to: template.level_to,
                        capacity: template.capacity,
                        monthly_price_minor: template.monthly_price_minor,
                        valid_from: template.valid_from,
                        valid_until: template.valid_until,
                    });
                }
            }
        }
    }

    generated
}

// Stepping in whole minutes keeps the walk inside a single day; `NaiveTime` arithmetic wraps.
fn window_start_times(window: &TimeWindow) -> Vec<NaiveTime> {
    let start = window.start.num_seconds_from_midnight() / 60;
    let end = window.end.num_seconds_from_midnight() / 60;

    if window.interval_minutes == 0 {
        return Vec::new();
    }

    (start..end)
        .step_by(window.interval_minutes as usize)
        .filter_map(|minute| NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0))
        .collect()
}

#[derive(Debug, Error)]
pub enum ClassGenerationError {
    #[error("invalid bulk class request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ClassGenerationError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ClassGenerationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ClassGenerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ClassGenerationError>;

pub struct ClassGenerationUseCase<C>
where
    C: ClassRepository + Send + Sync + 'static,
{
    class_repo: Arc<C>,
}

impl<C> ClassGenerationUseCase<C>
where
    C: ClassRepository + Send + Sync + 'static,
{
    pub fn new(class_repo: Arc<C>) -> Self {
        Self { class_repo }
    }

    pub fn preview(&self, request: BulkClassRequest) -> UseCaseResult<BulkClassPreviewDto> {
        let (template, multiplication) = Self::parse_request(request)?;
        let classes = generate_class_instances(&template, &multiplication);

        info!(
            club_id = %template.club_id,
            total = classes.len(),
            "classes: bulk preview generated"
        );

        Ok(BulkClassPreviewDto {
            total: classes.len(),
            classes,
        })
    }

    pub async fn bulk_create(&self, request: BulkClassRequest) -> UseCaseResult<BulkClassCreatedDto> {
        let (template, multiplication) = Self::parse_request(request)?;
        let classes = generate_class_instances(&template, &multiplication);

        if classes.is_empty() {
            info!(club_id = %template.club_id, "classes: bulk create produced no classes");
            return Ok(BulkClassCreatedDto {
                created: 0,
                class_ids: Vec::new(),
            });
        }

        let total = classes.len();
        let rows: Vec<InsertClassEntity> = classes.into_iter().map(InsertClassEntity::from).collect();

        let class_ids = self.class_repo.insert_many(rows).await.map_err(|err| {
            error!(
                club_id = %template.club_id,
                total,
                db_error = ?err,
                "classes: failed to insert generated classes"
            );
            ClassGenerationError::Internal(err)
        })?;

        info!(
            club_id = %template.club_id,
            created = class_ids.len(),
            "classes: bulk create completed"
        );

        Ok(BulkClassCreatedDto {
            created: class_ids.len(),
            class_ids,
        })
    }

    fn parse_request(
        request: BulkClassRequest,
    ) -> UseCaseResult<(ClassTemplate, ClassMultiplication)> {
        let invalid = |reason: String| {
            let err = ClassGenerationError::InvalidRequest(reason);
            warn!(
                status = err.status_code().as_u16(),
                error = %err,
                "classes: rejected bulk class request"
            );
            err
        };

        if request.name.trim().is_empty() {
            return Err(invalid("name is required".to_string()));
        }
        if request.level_from > request.level_to {
            return Err(invalid("level_from must be <= level_to".to_string()));
        }
        if request.duration_minutes <= 0 {
            return Err(invalid("duration_minutes must be positive".to_string()));
        }
        if request.capacity <= 0 {
            return Err(invalid("capacity must be positive".to_string()));
        }
        if request.monthly_price_minor < 0 {
            return Err(invalid("monthly_price_minor must not be negative".to_string()));
        }
        if request.valid_from > request.valid_until {
            return Err(invalid("valid_from must be on or before valid_until".to_string()));
        }

        let windows = request
            .time_windows
            .iter()
            .map(parse_window)
            .collect::<Result<Vec<_>, String>>()
            .map_err(invalid)?;

        let template = ClassTemplate {
            name: request.name.trim().to_string(),
            club_id: request.club_id,
            level_from: request.level_from,
            level_to: request.level_to,
            duration_minutes: request.duration_minutes,
            monthly_price_minor: request.monthly_price_minor,
            capacity: request.capacity,
            valid_from: request.valid_from,
            valid_until: request.valid_until,
        };

        let multiplication = ClassMultiplication {
            days: request.days,
            windows,
            courts: request.courts,
            trainer_ids: request.trainer_ids,
        };

        Ok((template, multiplication))
    }
}

fn parse_window(model: &TimeWindowModel) -> Result<TimeWindow, String> {
    let parse = |raw: &str, field: &str| {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|_| format!("time window {field} `{raw}` must be HH:MM"))
    };

    if model.interval_minutes == 0 {
        return Err("time window interval_minutes must be positive".to_string());
    }

    Ok(TimeWindow {
        start: parse(&model.start, "start")?,
        end: parse(&model.end, "end")?,
        interval_minutes: model.interval_minutes,
    })
}
