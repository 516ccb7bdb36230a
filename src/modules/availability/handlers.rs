use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::availability::{Slot, WeekAvailability};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayResponse {
    pub slots: Vec<Slot>,
    pub date: String,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /availability?date=YYYY-MM-DD&timezone=Area/City
pub async fn day_availability(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> AppResult<Json<DayResponse>> {
    let date = parse_date(query.date.as_deref())?;
    let timezone = parse_timezone(query.timezone.as_deref(), &state)?;

    let day = state.availability.day_availability(date, timezone).await?;

    Ok(Json(DayResponse {
        slots: day.slots,
        date: date.format("%Y-%m-%d").to_string(),
        timezone: timezone.name().to_string(),
        message: day.message,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub start: Option<String>,
    pub timezone: Option<String>,
}

/// GET /availability/week?start=YYYY-MM-DD&timezone=Area/City
pub async fn week_availability(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> AppResult<Json<WeekAvailability>> {
    let start = parse_date(query.start.as_deref())?;
    let timezone = parse_timezone(query.timezone.as_deref(), &state)?;

    let week = state.availability.week_availability(start, timezone).await?;
    Ok(Json(week))
}

fn parse_date(raw: Option<&str>) -> AppResult<NaiveDate> {
    raw.and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
        .ok_or_else(|| AppError::BadRequest("Valid date parameter required (YYYY-MM-DD)".to_string()))
}

/// An absent zone falls back to the owner's; an unparseable one is an
/// error rather than silently showing someone the wrong times.
fn parse_timezone(raw: Option<&str>, state: &AppState) -> AppResult<Tz> {
    match raw {
        None => Ok(state.env.booking.owner_timezone),
        Some(value) => value
            .parse::<Tz>()
            .map_err(|_| AppError::BadRequest("Unknown timezone".to_string())),
    }
}
