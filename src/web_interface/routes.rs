use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use percent_encoding::percent_decode_str;
use serde_json::json;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ApiError, CandidateRequest, EventsQuery, NewEventRequest, SessionRequest};
use crate::error_handling::types::ReportError;
use crate::scoring::report::ReportService;
use crate::storage::storage_trait::{EventStore, InterviewStore, SessionInfoStore, Storage};
use crate::storage::types::{EventQuery, TimeOrder};

/// Page size of `GET /api/events` when none is given.
pub const DEFAULT_EVENT_LIMIT: usize = 200;
/// Largest page `GET /api/events` returns.
pub const MAX_EVENT_LIMIT: usize = 1000;

const BODY_LIMIT: u64 = 1024 * 1024;

fn error_reply(message: &str, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(&ApiError::new(message)), status).into_response()
}

fn ok_reply(body: serde_json::Value) -> reply::Response {
    reply::with_status(reply::json(&body), StatusCode::OK).into_response()
}

/// Path parameters arrive percent-encoded; ids are stored decoded.
fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// GET /api/health
pub fn health_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "health")
        .and(warp::get())
        .map(|| reply::json(&json!({ "ok": true })))
}

/// POST /api/events
pub fn post_event_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "events")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and_then(move |body: NewEventRequest| {
            let storage = storage.clone();
            async move {
                let Some(event) = body.into_event(Utc::now()) else {
                    return Ok::<_, Rejection>(error_reply(
                        "sessionId and type required",
                        StatusCode::BAD_REQUEST,
                    ));
                };
                let session_id = event.session_id.clone();
                match storage.append(event).await {
                    Ok(id) => {
                        debug!("[{}] event {} recorded", session_id, id);
                        Ok::<_, Rejection>(ok_reply(json!({ "ok": true, "id": id })))
                    }
                    Err(e) => {
                        error!("[{}] failed to record event: {}", session_id, e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to save event",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// GET /api/events?sessionId&type&limit
pub fn list_events_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "events")
        .and(warp::get())
        .and(warp::query::<EventsQuery>())
        .and_then(move |params: EventsQuery| {
            let storage = storage.clone();
            async move {
                let query = EventQuery {
                    session_id: params.session_id,
                    event_type: params.event_type,
                    limit: Some(
                        params
                            .limit
                            .unwrap_or(DEFAULT_EVENT_LIMIT)
                            .min(MAX_EVENT_LIMIT),
                    ),
                    order: TimeOrder::Descending,
                };
                match storage.query(&query).await {
                    Ok(events) => {
                        Ok::<_, Rejection>(ok_reply(json!({ "ok": true, "events": events })))
                    }
                    Err(e) => {
                        error!("Failed to list events: {}", e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to load events",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// POST /api/sessions
pub fn upsert_session_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "sessions")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and_then(move |body: SessionRequest| {
            let storage = storage.clone();
            async move {
                let Some(info) = body.into_info() else {
                    return Ok::<_, Rejection>(error_reply(
                        "sessionId required",
                        StatusCode::BAD_REQUEST,
                    ));
                };
                let session_id = info.session_id.clone();
                match storage.upsert_session_info(info).await {
                    Ok(session) => {
                        Ok::<_, Rejection>(ok_reply(json!({ "ok": true, "session": session })))
                    }
                    Err(e) => {
                        error!("[{}] failed to save session: {}", session_id, e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to save session",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// GET /api/sessions/:id
pub fn get_session_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "sessions" / String)
        .and(warp::get())
        .and_then(move |raw: String| {
            let storage = storage.clone();
            let session_id = decode_segment(&raw);
            async move {
                match storage.get_session_info(&session_id).await {
                    Ok(Some(session)) => {
                        Ok::<_, Rejection>(ok_reply(json!({ "ok": true, "session": session })))
                    }
                    Ok(None) => Ok::<_, Rejection>(error_reply(
                        "Session not found",
                        StatusCode::NOT_FOUND,
                    )),
                    Err(e) => {
                        error!("[{}] failed to load session: {}", session_id, e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to load session",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// GET /api/reports/:sessionId
///
/// Recomputes the report from every stored event and persists it.
pub fn report_route(
    reports: Arc<ReportService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "reports" / String)
        .and(warp::get())
        .and_then(move |raw: String| {
            let reports = reports.clone();
            let session_id = decode_segment(&raw);
            async move {
                match reports.generate(&session_id).await {
                    Ok((envelope, events)) => Ok::<_, Rejection>(ok_reply(json!({
                        "ok": true,
                        "summary": envelope.summary,
                        "report": envelope.report,
                        "events": events,
                    }))),
                    Err(ReportError::MissingSessionId) => Ok::<_, Rejection>(error_reply(
                        "sessionId required",
                        StatusCode::BAD_REQUEST,
                    )),
                    Err(e) => {
                        error!("[{}] {}", session_id, e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to build report",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// GET /api/reports/:sessionId/stored
pub fn stored_report_route(
    reports: Arc<ReportService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "reports" / String / "stored")
        .and(warp::get())
        .and_then(move |raw: String| {
            let reports = reports.clone();
            let session_id = decode_segment(&raw);
            async move {
                match reports.stored(&session_id).await {
                    Ok(Some(report)) => {
                        Ok::<_, Rejection>(ok_reply(json!({ "ok": true, "report": report })))
                    }
                    Ok(None) => Ok::<_, Rejection>(error_reply(
                        "Report not found",
                        StatusCode::NOT_FOUND,
                    )),
                    Err(e) => {
                        error!("[{}] {}", session_id, e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to load report",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// GET /api/interviews/:token
///
/// Resolves a candidate's join token to its interview and session.
pub fn get_interview_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "interviews" / String)
        .and(warp::get())
        .and_then(move |raw: String| {
            let storage = storage.clone();
            let token = decode_segment(&raw);
            async move {
                match storage.get_interview(&token).await {
                    Ok(Some(interview)) => Ok::<_, Rejection>(ok_reply(
                        json!({ "ok": true, "interview": interview }),
                    )),
                    Ok(None) => Ok::<_, Rejection>(error_reply("Not found", StatusCode::NOT_FOUND)),
                    Err(e) => {
                        error!("Failed to fetch interview: {}", e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to fetch interview",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// POST /api/interviews/:token/candidate
///
/// Records the candidate's name and email and marks the interview started.
pub fn register_candidate_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "interviews" / String / "candidate")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and_then(move |raw: String, body: CandidateRequest| {
            let storage = storage.clone();
            let token = decode_segment(&raw);
            async move {
                match storage
                    .start_interview(&token, body.candidate_name, body.candidate_email)
                    .await
                {
                    Ok(Some(interview)) => {
                        info!("[{}] candidate joined interview", interview.session_id);
                        Ok::<_, Rejection>(ok_reply(json!({ "ok": true, "interview": interview })))
                    }
                    Ok(None) => Ok::<_, Rejection>(error_reply("Not found", StatusCode::NOT_FOUND)),
                    Err(e) => {
                        error!("Failed to update candidate: {}", e);
                        Ok::<_, Rejection>(error_reply(
                            "Failed to update candidate",
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// Every `/api` route.
pub fn api_routes(
    storage: Arc<dyn Storage>,
    reports: Arc<ReportService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    info!("Mounting /api routes");
    health_route()
        .or(post_event_route(storage.clone()))
        .or(list_events_route(storage.clone()))
        .or(upsert_session_route(storage.clone()))
        .or(get_session_route(storage.clone()))
        .or(get_interview_route(storage.clone()))
        .or(register_candidate_route(storage))
        .or(stored_report_route(reports.clone()))
        .or(report_route(reports))
}
