use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Local;
use tracing::error;

use crate::api::AppState;
use crate::api::dtos::{
    ErrorResponse, HealthResponse, SearchParams, SearchResponse, TrendParams, TrendResponse,
    build_query,
};
use crate::query::{chart_status, history, rank_trend};

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn store_unavailable(err: impl std::fmt::Display) -> Response {
    error!("Failed to read record store: {}", err);
    error_response(StatusCode::SERVICE_UNAVAILABLE, "Record store unavailable")
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.records.records().await {
        Ok(records) => Json(HealthResponse {
            status: "OK".to_string(),
            records: records.len(),
        })
        .into_response(),
        Err(e) => store_unavailable(e),
    }
}

pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = match build_query(
        &params.q,
        params.exact,
        params.channel.as_deref(),
        params.list.as_deref(),
    ) {
        Ok(query) => query,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, error),
    };

    let records = match state.records.records().await {
        Ok(records) => records,
        Err(e) => return store_unavailable(e),
    };

    Json(SearchResponse {
        status: chart_status(&records, &query),
        history: history(&records, &query),
        query: query.text,
    })
    .into_response()
}

pub async fn trend(State(state): State<AppState>, Query(params): Query<TrendParams>) -> Response {
    let query = match build_query(
        &params.q,
        params.exact,
        params.channel.as_deref(),
        params.list.as_deref(),
    ) {
        Ok(query) => query,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, error),
    };

    let records = match state.records.records().await {
        Ok(records) => records,
        Err(e) => return store_unavailable(e),
    };

    let points = rank_trend(&records, &query, params.days, Local::now().date_naive());
    if points.is_empty() {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("No ranking data for '{}'", query.text),
        );
    }

    Json(TrendResponse {
        query: query.text,
        days: params.days,
        points,
    })
    .into_response()
}
