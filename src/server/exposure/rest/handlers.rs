//! HTTP handlers for the two tables

use super::params::{parse_bulk_filter, parse_id, parse_limit};
use crate::core::error::{InviteError, InviteResult, RequestError, ValidationError};
use crate::core::link::build_invitation_link;
use crate::core::model::{GuestInvitation, NewGuestInvitation, NewRsvpMessage, RsvpMessage};
use crate::core::row::Row;
use crate::core::service::{Backend, RowService};
use crate::pages::rsvp::{FEED_LIMIT, RsvpStats};
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// A table reachable through the generic handlers
pub trait ExposedTable: Row {
    /// Rows returned by a select without `limit`
    const DEFAULT_LIMIT: Option<usize>;

    fn service(backend: &Backend) -> &Arc<dyn RowService<Self>>;
}

impl ExposedTable for GuestInvitation {
    const DEFAULT_LIMIT: Option<usize> = None;

    fn service(backend: &Backend) -> &Arc<dyn RowService<Self>> {
        &backend.invitations
    }
}

impl ExposedTable for RsvpMessage {
    const DEFAULT_LIMIT: Option<usize> = Some(FEED_LIMIT);

    fn service(backend: &Backend) -> &Arc<dyn RowService<Self>> {
        &backend.messages
    }
}

/// Result of a bulk delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Body of `POST /guest_invitations`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvitationRequest {
    pub guest_name: String,
    /// Built from the configured site URL when omitted
    #[serde(default)]
    pub link: Option<String>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> InviteResult<T> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        RequestError::InvalidBody {
            message: rejection.body_text(),
        }
        .into()
    })
}

/// GET /rest/v1/{table}?limit=N
pub async fn list_rows<T: ExposedTable>(
    State(host): State<Arc<ServerHost>>,
    Query(params): Query<HashMap<String, String>>,
) -> InviteResult<Json<Vec<T>>> {
    let limit = parse_limit(&params, T::DEFAULT_LIMIT)?;
    let rows = T::service(&host.backend).select(limit).await?;
    Ok(Json(rows))
}

/// DELETE /rest/v1/{table}/{id}
pub async fn delete_row<T: ExposedTable>(
    State(host): State<Arc<ServerHost>>,
    Path(id): Path<String>,
) -> InviteResult<StatusCode> {
    let id = parse_id::<T>(&id)?;
    T::service(&host.backend).delete(id).await?;
    tracing::info!(table = %T::TABLE, id = %id, "row deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /rest/v1/{table}?id=neq.<sentinel>
pub async fn delete_rows<T: ExposedTable>(
    State(host): State<Arc<ServerHost>>,
    Query(params): Query<HashMap<String, String>>,
) -> InviteResult<Json<DeletedResponse>> {
    let sentinel = parse_bulk_filter::<T>(&params)?;
    let deleted = T::service(&host.backend)
        .delete_all_except(sentinel)
        .await?;
    tracing::info!(table = %T::TABLE, deleted = deleted, "bulk delete");
    Ok(Json(DeletedResponse { deleted }))
}

/// POST /rest/v1/guest_invitations
pub async fn create_invitation(
    State(host): State<Arc<ServerHost>>,
    payload: Result<Json<CreateInvitationRequest>, JsonRejection>,
) -> InviteResult<impl IntoResponse> {
    let request = body(payload)?;
    let guest_name = request.guest_name.trim().to_string();
    if guest_name.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "guest_name".to_string(),
        }
        .into());
    }

    let link = match request.link {
        Some(link) => link,
        None => build_invitation_link(host.site_url(), &guest_name)?,
    };

    let draft = NewGuestInvitation { guest_name, link };
    draft.validate().map_err(InviteError::from)?;

    let row = host.backend.invitations.insert(draft).await?;
    tracing::info!(id = row.id, guest = %row.guest_name, "invitation created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /rest/v1/rsvp_messages
pub async fn create_message(
    State(host): State<Arc<ServerHost>>,
    payload: Result<Json<NewRsvpMessage>, JsonRejection>,
) -> InviteResult<impl IntoResponse> {
    let draft = body(payload)?.normalized();
    draft.validate().map_err(InviteError::from)?;

    let row = host.backend.messages.insert(draft).await?;
    tracing::info!(id = %row.id, attendance = %row.attendance, "rsvp received");
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /rest/v1/rsvp_messages/stats
pub async fn message_stats(State(host): State<Arc<ServerHost>>) -> InviteResult<Json<RsvpStats>> {
    let messages = host.backend.messages.select(Some(FEED_LIMIT)).await?;
    Ok(Json(RsvpStats::from_messages(&messages)))
}
