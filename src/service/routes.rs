//! API route handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ApiError, AppState};
use crate::common::{SensorReading, FEATURES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: i8,
    pub anomaly_score: f64,
}

/// Pull a reading out of a JSON request body.
///
/// All three fields are required; `null` counts as missing. The hour must be a time of
/// day, in `[0, 24)`.
pub fn parse_reading(body: &Value) -> Result<SensorReading, String> {
    let object = body
        .as_object()
        .ok_or_else(|| "request body must be a JSON object".to_string())?;

    let mut values = [0.0; 3];
    for (value, name) in values.iter_mut().zip(FEATURES) {
        *value = match object.get(name) {
            None | Some(Value::Null) => return Err(format!("missing field `{name}`")),
            Some(field) => field
                .as_f64()
                .ok_or_else(|| format!("field `{name}` must be a number"))?,
        };
    }

    let reading = SensorReading::new(values[0], values[1], values[2]);
    if !(0.0..24.0).contains(&reading.hour) {
        return Err(format!(
            "field `hour` must be in [0, 24), got {}",
            reading.hour
        ));
    }
    Ok(reading)
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let reading = parse_reading(&body).map_err(ApiError::BadRequest)?;

    let label = state.detector.classify(&reading)?;
    let score = state.detector.score(&reading)?;
    if !score.is_finite() {
        return Err(ApiError::Internal(format!(
            "model produced a non-finite score: {score}"
        )));
    }

    debug!(?reading, prediction = label.as_i8(), score, "scored reading");
    Ok(Json(PredictResponse {
        prediction: label.as_i8(),
        anomaly_score: score,
    }))
}

/// Liveness probe, with a description of the loaded model.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model.as_ref(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_reading() {
        let body = json!({"hour": 10, "vibration": 1200, "temperature_c": 25.0});
        assert_eq!(
            parse_reading(&body).unwrap(),
            SensorReading::new(10.0, 1200.0, 25.0)
        );
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let body = json!({"hour": 1, "vibration": 1.0, "temperature_c": 2.0, "site": "north"});
        assert!(parse_reading(&body).is_ok());
    }

    #[test]
    fn test_parse_missing_field() {
        let body = json!({"hour": 10, "temperature_c": 25.0});
        assert_eq!(
            parse_reading(&body).unwrap_err(),
            "missing field `vibration`"
        );
    }

    #[test]
    fn test_parse_null_is_missing() {
        let body = json!({"hour": 10, "vibration": null, "temperature_c": 25.0});
        assert_eq!(
            parse_reading(&body).unwrap_err(),
            "missing field `vibration`"
        );
    }

    #[test]
    fn test_parse_non_numeric_field() {
        let body = json!({"hour": 10, "vibration": "1200", "temperature_c": 25.0});
        assert_eq!(
            parse_reading(&body).unwrap_err(),
            "field `vibration` must be a number"
        );
    }

    #[test]
    fn test_parse_hour_out_of_range() {
        let body = json!({"hour": 24, "vibration": 1200, "temperature_c": 25.0});
        assert!(parse_reading(&body).unwrap_err().contains("hour"));
        let body = json!({"hour": -1, "vibration": 1200, "temperature_c": 25.0});
        assert!(parse_reading(&body).is_err());
    }

    #[test]
    fn test_parse_not_an_object() {
        assert!(parse_reading(&json!([10, 1200, 25.0])).is_err());
    }
}
