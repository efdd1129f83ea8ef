use actix_web::error::BlockingError;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{debug, error, info, instrument, warn};

use crate::api::models::{
    AddRedirectRequest, AddRedirectsRequest, BatchResponse, DeleteRedirectsRequest, DeleteResponse,
    ErrorResponse, HealthStatus, LicenseResponse, ListRedirectsQuery, ProcessUrlsRequest,
    QueueUrlsRequest, RewrittenUrlQuery, RewrittenUrlResponse, SuccessResponse, UrlsToProcessResponse,
};
use crate::api::AppState;
use crate::lifecycle::DialogFlow;
use crate::manager::{Actor, RedirectError, RedirectManager};
use crate::site::{project_for_request, resolve_project, Project};
use crate::store::ListQuery;

/// Header naming the user a request is made for
pub const USER_HEADER: &str = "X-User-Id";

/// Header naming the editor session; the user id is used when it is missing
pub const SESSION_HEADER: &str = "X-Session-Id";

const DEFAULT_PER_PAGE: usize = 20;

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn current_actor(req: &HttpRequest, state: &AppState) -> Result<Actor, HttpResponse> {
    let user_id = header_value(req, USER_HEADER).ok_or_else(|| {
        debug!("Request without {}", USER_HEADER);
        HttpResponse::Unauthorized().json(ErrorResponse::new(format!("Missing {} header", USER_HEADER)))
    })?;

    state.config.actor(&user_id).ok_or_else(|| {
        warn!("Request from unknown user '{}'", user_id);
        HttpResponse::Unauthorized().json(ErrorResponse::new(format!("Unknown user '{}'", user_id)))
    })
}

fn require_admin(req: &HttpRequest, state: &AppState) -> Result<Actor, HttpResponse> {
    let actor = current_actor(req, state)?;
    if !actor.is_admin {
        warn!("User '{}' is not an administrator", actor.id);
        return Err(HttpResponse::Forbidden()
            .json(ErrorResponse::new(format!("User '{}' is not an administrator", actor.id))));
    }
    Ok(actor)
}

fn lookup_project(
    manager: &RedirectManager,
    name: Option<&str>,
    lang: Option<&str>,
) -> Result<Project, RedirectError> {
    let name = name.unwrap_or_default();
    let lang = lang.unwrap_or_default();
    resolve_project(manager.sites(), name, lang)?
        .ok_or_else(|| RedirectError::UnknownProject(format!("{} ({})", name, lang)))
}

/// Maps a failed operation to the response the admin UI expects
fn error_response(e: &RedirectError) -> HttpResponse {
    match e {
        RedirectError::NotLicensed { store_url, .. } => {
            HttpResponse::build(StatusCode::PAYMENT_REQUIRED).json(LicenseResponse {
                status: "error".to_string(),
                message: e.to_string(),
                store_url: store_url.clone(),
            })
        }
        RedirectError::PermissionDenied { .. } => HttpResponse::Forbidden().json(ErrorResponse::new(e.to_string())),
        RedirectError::UnknownProject(_) => HttpResponse::NotFound().json(ErrorResponse::new(e.to_string())),
        RedirectError::InvalidUrl(_) | RedirectError::UnknownTarget(_) => {
            HttpResponse::BadRequest().json(SuccessResponse::failed(e.to_string()))
        }
        RedirectError::Storage(_) => {
            HttpResponse::InternalServerError().json(SuccessResponse::failed("Redirect storage failed"))
        }
    }
}

fn blocking_failed(e: BlockingError) -> HttpResponse {
    error!("Blocking task failed: {}", e);
    HttpResponse::InternalServerError().json(ErrorResponse::new("Internal error in request handling."))
}

/// Adds one redirect
#[instrument(skip(req, state, request), fields(source = %request.source_url))]
pub async fn add_redirect(
    req: HttpRequest,
    state: web::Data<AppState>,
    request: web::Json<AddRedirectRequest>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let manager = state.manager.clone();
    let request = request.into_inner();
    let result = web::block(move || {
        let project = lookup_project(&manager, request.project.as_deref(), request.lang.as_deref())?;
        manager.add_redirect(&request.source_url, &request.target_url, &project)
    })
    .await;

    match result {
        Ok(Ok(())) => HttpResponse::Ok().json(SuccessResponse::ok()),
        Ok(Err(e)) => {
            warn!("Adding redirect failed: {}", e);
            error_response(&e)
        }
        Err(e) => blocking_failed(e),
    }
}

/// Adds several redirects to one project
#[instrument(skip_all)]
pub async fn add_redirects(
    req: HttpRequest,
    state: web::Data<AppState>,
    request: web::Json<AddRedirectsRequest>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let manager = state.manager.clone();
    let request = request.into_inner();
    let result = web::block(move || {
        let project = lookup_project(&manager, request.project.as_deref(), request.lang.as_deref())?;
        manager.add_redirects(&request.redirects, &project)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => {
            info!("Batch added {} redirect(s), {} failed", outcome.added, outcome.failed);
            HttpResponse::Ok().json(BatchResponse {
                success: outcome.is_success(),
                added: outcome.added,
                failed: outcome.failed,
            })
        }
        Ok(Err(e)) => error_response(&e),
        Err(e) => blocking_failed(e),
    }
}

/// Lists the redirects of a project for the admin grid
#[instrument(skip(req, state, query), fields(project = ?query.project, page = ?query.page))]
pub async fn list_redirects(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ListRedirectsQuery>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let manager = state.manager.clone();
    let query = query.into_inner();
    let result = web::block(move || {
        let project = lookup_project(&manager, query.project.as_deref(), query.lang.as_deref())?;

        let list = match (query.page, query.per_page) {
            (Some(page), per_page) => ListQuery::page(page, per_page.unwrap_or(DEFAULT_PER_PAGE)),
            (None, per_page) => ListQuery {
                limit: per_page,
                ..ListQuery::default()
            },
        };
        let list = list.with_search(query.search.unwrap_or_default());

        Ok::<_, RedirectError>(manager.get_redirects(&project, &list)?)
    })
    .await;

    match result {
        Ok(Ok(page)) => HttpResponse::Ok().json(page),
        Ok(Err(e)) => error_response(&e),
        Err(e) => blocking_failed(e),
    }
}

/// Deletes redirects by their source URLs
///
/// Needs the `redirect.delete` permission, admin rights alone are not enough.
#[instrument(skip_all)]
pub async fn delete_redirects(
    req: HttpRequest,
    state: web::Data<AppState>,
    request: web::Json<DeleteRedirectsRequest>,
) -> HttpResponse {
    let actor = match current_actor(&req, &state) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let manager = state.manager.clone();
    let request = request.into_inner();
    let result = web::block(move || {
        let project = lookup_project(&manager, request.project.as_deref(), request.lang.as_deref())?;
        manager.delete_redirects(&actor, &request.urls, &project)
    })
    .await;

    match result {
        Ok(Ok(deleted)) => HttpResponse::Ok().json(DeleteResponse { success: true, deleted }),
        Ok(Err(e)) => error_response(&e),
        Err(e) => blocking_failed(e),
    }
}

/// Resolves an internal link to the rewritten URL of its page
#[instrument(skip(req, state, query), fields(url = %query.url))]
pub async fn rewritten_url(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<RewrittenUrlQuery>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state) {
        return response;
    }

    let manager = state.manager.clone();
    let query = query.into_inner();
    let result = web::block(move || {
        let project = lookup_project(&manager, query.project.as_deref(), query.lang.as_deref())?;
        manager.rewritten_url_for_link(&query.url, &project)
    })
    .await;

    match result {
        Ok(Ok(url)) => HttpResponse::Ok().json(RewrittenUrlResponse { url }),
        Ok(Err(e)) => error_response(&e),
        Err(e) => blocking_failed(e),
    }
}

fn session_id(req: &HttpRequest, actor: &Actor) -> String {
    header_value(req, SESSION_HEADER).unwrap_or_else(|| actor.id.clone())
}

#[instrument(skip_all)]
pub async fn urls_to_process(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let actor = match require_admin(&req, &state) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let session = session_id(&req, &actor);
    let flow = DialogFlow::new(&state.manager, state.sessions.as_ref(), &session);
    match flow.urls_to_process() {
        Ok(urls) => HttpResponse::Ok().json(UrlsToProcessResponse { urls }),
        Err(e) => {
            error!("Failed to read queue of session {}: {:#}", session, e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Failed to read URL queue"))
        }
    }
}

/// Replaces the editor's queue of URLs still to decide on
#[instrument(skip_all)]
pub async fn queue_urls(
    req: HttpRequest,
    state: web::Data<AppState>,
    request: web::Json<QueueUrlsRequest>,
) -> HttpResponse {
    let actor = match require_admin(&req, &state) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let session = session_id(&req, &actor);
    let flow = DialogFlow::new(&state.manager, state.sessions.as_ref(), &session);
    match flow.queue(&request.urls) {
        Ok(()) => HttpResponse::Ok().json(SuccessResponse::ok()),
        Err(e) => {
            error!("Failed to queue URLs for session {}: {:#}", session, e);
            HttpResponse::InternalServerError().json(SuccessResponse::failed("Failed to queue URLs"))
        }
    }
}

/// Processes the editor's answer to one redirect dialog
#[instrument(skip(req, state, request), fields(source = %request.source_url))]
pub async fn process_further_urls(
    req: HttpRequest,
    state: web::Data<AppState>,
    request: web::Json<ProcessUrlsRequest>,
) -> HttpResponse {
    let actor = match require_admin(&req, &state) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let session = session_id(&req, &actor);
    let manager = state.manager.clone();
    let sessions = state.sessions.clone();
    let request = request.into_inner();
    let result = web::block(move || {
        let project = lookup_project(&manager, request.project.as_deref(), request.lang.as_deref())?;
        DialogFlow::new(&manager, sessions.as_ref(), &session).process_further_urls(
            &request.source_url,
            request.target_url.as_deref(),
            request.skip_children,
            &project,
        )
    })
    .await;

    match result {
        Ok(Ok(step)) => HttpResponse::Ok().json(step),
        Ok(Err(e)) => error_response(&e),
        Err(e) => blocking_failed(e),
    }
}

/// Health check endpoint for monitoring service status
///
/// Reports `degraded` when the redirect tables cannot be read.
#[instrument(skip(state))]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    debug!("Processing health check request");

    let manager = state.manager.clone();
    let count = match web::block(move || manager.redirect_count(None)).await {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            warn!("Health check could not count redirects: {:#}", e);
            None
        }
        Err(e) => {
            warn!("Health check task failed: {}", e);
            None
        }
    };

    let status = if count.is_some() { "healthy" } else { "degraded" };
    info!("Health check: status={}, redirects={:?}", status, count);
    HttpResponse::Ok().json(HealthStatus {
        status: status.to_string(),
        redirects: count,
        uptime: state.started.elapsed().as_secs(),
    })
}

/// Answers every request no other route matched
///
/// Stored redirects are served as 301 (302 in development mode); anything
/// else, including lookup failures, is a JSON 404.
#[instrument(skip(req, state), fields(uri = %req.uri()))]
pub async fn resolve_handler(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let host = req.connection_info().host().to_string();

    let manager = state.manager.clone();
    let resolver = state.resolver.clone();
    let lookup_uri = uri.clone();
    let result = web::block(move || {
        let project = project_for_request(manager.sites(), &host, &lookup_uri)?;
        Ok::<_, anyhow::Error>(resolver.resolve(&lookup_uri, StatusCode::NOT_FOUND.as_u16(), &project))
    })
    .await;

    let redirect = match result {
        Ok(Ok(redirect)) => redirect,
        Ok(Err(e)) => {
            warn!("No project for request {}: {:#}", uri, e);
            None
        }
        Err(e) => {
            warn!("Resolver task failed: {}", e);
            None
        }
    };

    match redirect {
        Some(redirect) => {
            let status = StatusCode::from_u16(redirect.status).unwrap_or(StatusCode::MOVED_PERMANENTLY);
            HttpResponse::build(status)
                .insert_header((header::LOCATION, redirect.location))
                .finish()
        }
        None => {
            debug!("Nothing to redirect for {}", uri);
            HttpResponse::NotFound().json(ErrorResponse::new(format!("Not found: {}", uri)))
        }
    }
}
