//! Production queue. Stock entries later draw their counts from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use forex_core::validation::{validate_count, validate_id};
use forex_core::{EntryToProcess, InProcess};
use forex_db::repository::{process, product_type};

use super::commit;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessRequest {
    pub product_type_id: i64,
    pub count: i64,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InProcessDto {
    #[serde(flatten)]
    pub in_process: InProcess,
    pub product_id: i64,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Sends `count` items of a type to production.
pub async fn send_to_process(state: &AppState, request: ProcessRequest) -> ApiResult<i64> {
    debug!(product_type_id = %request.product_type_id, count = %request.count, "Sending to production");
    validate_id("product_type_id", request.product_type_id)?;
    validate_count("count", request.count)?;

    let mut tx = state.db.begin().await?;
    product_type::get(&mut tx, request.product_type_id).await?;
    let id = process::insert_entry(
        &mut tx,
        &EntryToProcess {
            id: 0,
            product_type_id: request.product_type_id,
            count: request.count,
            date: request.date.unwrap_or_else(Utc::now),
        },
    )
    .await?;
    let queued = process::add_in_process(&mut tx, request.product_type_id, request.count).await?;

    commit(tx).await?;
    info!(product_type_id = %request.product_type_id, in_process = %queued, "Sent to production");
    Ok(id)
}

pub async fn list_in_process(state: &AppState) -> ApiResult<Vec<InProcessDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for queued in process::list_in_process(&mut conn).await? {
        let pt = product_type::get(&mut conn, queued.product_type_id).await?;
        out.push(InProcessDto {
            in_process: queued,
            product_id: pt.product_id,
            type_name: pt.type_name,
        });
    }
    Ok(out)
}

pub async fn list_process_entries(state: &AppState) -> ApiResult<Vec<EntryToProcess>> {
    let mut conn = state.db.acquire().await?;
    Ok(process::list_entries(&mut conn).await?)
}
