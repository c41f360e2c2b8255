//! Platform usage counters.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use storage::StatsSnapshot;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// `YYYY-MM-DD`; defaults to today (UTC).
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
}

/// Counters for one UTC day and its month. `day` wins over `year`/`month`;
/// the latter pair selects the first of that month.
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsSnapshot>, ApiError> {
    let day = resolve_day(&query)?;
    Ok(Json(state.store.stats(day)?))
}

fn resolve_day(query: &StatsQuery) -> Result<NaiveDate, ApiError> {
    if let Some(raw) = &query.day {
        return raw
            .parse()
            .map_err(|_| ApiError::Validation("day must be YYYY-MM-DD".into()));
    }
    match (query.year, query.month) {
        (Some(year), Some(month)) => NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| ApiError::Validation("invalid year/month".into())),
        (None, None) => Ok(Utc::now().date_naive()),
        _ => Err(ApiError::Validation(
            "year and month must be given together".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_param_wins() {
        let query = StatsQuery {
            day: Some("2026-02-03".into()),
            year: Some(2020),
            month: Some(1),
        };
        assert_eq!(
            resolve_day(&query).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()
        );
    }

    #[test]
    fn month_out_of_range_is_validation_error() {
        let query = StatsQuery {
            day: None,
            year: Some(2026),
            month: Some(13),
        };
        assert!(matches!(
            resolve_day(&query),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn lone_month_is_rejected() {
        let query = StatsQuery {
            day: None,
            year: None,
            month: Some(4),
        };
        assert!(resolve_day(&query).is_err());
    }
}
