//! HTTP handlers for the dashboard API.
//!
//! Each handler loads the latest snapshot and runs one query over it.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::{Contributor, Repository};
use crate::query::stats::{
    LocationGroup, MultiRepoContributor, contributors_by_location, multi_repo_contributors,
};
use crate::query::{
    ContributorQuery, ContributorView, DashboardStats, ExtendedStats, FileHeaders, Page,
    PageParams, QueryService, RepositoryQuery, RepositoryView, TableSample, contributor_view,
    dashboard_stats, extended_stats, filter_contributors, filter_repositories, repository_view,
};
use crate::server::error::ApiError;
use crate::storage::TableKind;

pub type AppState = Arc<QueryService>;

type ApiResult<T> = Result<Json<T>, ApiError>;
type QueryParams<T> = Result<Query<T>, QueryRejection>;

const DEFAULT_MIN_REPOS: usize = 2;
const DEFAULT_SAMPLE_ROWS: usize = 5;
const MAX_SAMPLE_ROWS: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct MultiRepoParams {
    pub min_repos: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SampleParams {
    pub table: Option<String>,
    pub limit: Option<usize>,
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "GitHub Data Dashboard API" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_repositories(
    State(service): State<AppState>,
    params: QueryParams<RepositoryQuery>,
) -> ApiResult<Page<Repository>> {
    let Query(params) = params?;
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(filter_repositories(
        &snapshot.repositories_detailed,
        &params,
    )?))
}

pub async fn get_repository(
    State(service): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    params: QueryParams<PageParams>,
) -> ApiResult<RepositoryView> {
    let Query(params) = params?;
    let page = params.request()?;
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(repository_view(
        &snapshot,
        &format!("{owner}/{name}"),
        page,
    )?))
}

pub async fn list_contributors(
    State(service): State<AppState>,
    params: QueryParams<ContributorQuery>,
) -> ApiResult<Page<Contributor>> {
    let Query(params) = params?;
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(filter_contributors(&snapshot.contributors, &params)?))
}

pub async fn multi_repo(
    State(service): State<AppState>,
    params: QueryParams<MultiRepoParams>,
) -> ApiResult<Vec<MultiRepoContributor>> {
    let Query(params) = params?;
    let min_repos = params.min_repos.unwrap_or(DEFAULT_MIN_REPOS);
    if min_repos == 0 {
        return Err(AppError::validation("min_repos must be >= 1").into());
    }
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(multi_repo_contributors(&snapshot.contributors, min_repos)))
}

pub async fn by_location(State(service): State<AppState>) -> ApiResult<Vec<LocationGroup>> {
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(contributors_by_location(&snapshot.contributors)))
}

pub async fn get_contributor(
    State(service): State<AppState>,
    Path(username): Path<String>,
    params: QueryParams<PageParams>,
) -> ApiResult<ContributorView> {
    let Query(params) = params?;
    let page = params.request()?;
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(contributor_view(&snapshot, &username, page)?))
}

pub async fn stats(State(service): State<AppState>) -> ApiResult<DashboardStats> {
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(dashboard_stats(
        &snapshot.repositories_detailed,
        &snapshot.contributors,
    )))
}

pub async fn stats_extended(State(service): State<AppState>) -> ApiResult<ExtendedStats> {
    let snapshot = service.latest_snapshot().await?;
    Ok(Json(extended_stats(
        &snapshot.repositories_detailed,
        &snapshot.contributors,
    )))
}

pub async fn debug_files(State(service): State<AppState>) -> ApiResult<Vec<FileHeaders>> {
    Ok(Json(service.table_headers().await?))
}

pub async fn debug_sample(
    State(service): State<AppState>,
    params: QueryParams<SampleParams>,
) -> ApiResult<TableSample> {
    let Query(params) = params?;
    let table = params.table.as_deref().unwrap_or("repositories");
    let kind = TableKind::from_name(table)
        .ok_or_else(|| AppError::validation(format!("Unknown table: {table}")))?;
    let limit = params.limit.unwrap_or(DEFAULT_SAMPLE_ROWS);
    if limit == 0 || limit > MAX_SAMPLE_ROWS {
        return Err(AppError::validation(format!(
            "limit must be between 1 and {MAX_SAMPLE_ROWS}"
        ))
        .into());
    }
    Ok(Json(service.sample_rows(kind, limit).await?))
}
