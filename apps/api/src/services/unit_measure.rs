//! Units of measure.

use serde::Deserialize;
use tracing::{debug, info};

use forex_core::validation::{normalize_name, validate_id, validate_name, validate_required};
use forex_core::{CoreError, UnitMeasure};
use forex_db::repository::unit_measure;

use super::commit;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitMeasureRequest {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub position: i64,
}

impl UnitMeasureRequest {
    fn validate(&self) -> ApiResult<()> {
        validate_name("name", &self.name)?;
        validate_required("symbol", &self.symbol)?;
        Ok(())
    }

    fn to_unit(&self, id: i64) -> UnitMeasure {
        UnitMeasure {
            id,
            name: self.name.trim().to_string(),
            normalized_name: normalize_name(&self.name),
            symbol: self.symbol.trim().to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            is_default: self.is_default,
            is_active: self.is_active || self.is_default,
            position: self.position,
        }
    }
}

pub async fn create_unit_measure(state: &AppState, request: UnitMeasureRequest) -> ApiResult<i64> {
    debug!(name = %request.name, "Creating unit measure");
    request.validate()?;

    let mut unit = request.to_unit(0);
    let mut tx = state.db.begin().await?;
    if unit_measure::find_by_normalized_name(&mut tx, &unit.normalized_name)
        .await?
        .is_some()
    {
        return Err(CoreError::already_exists("Unit measure", "name", &unit.name).into());
    }

    if unit_measure::find_default(&mut tx).await?.is_none() {
        unit.is_default = true;
        unit.is_active = true;
    }
    let id = unit_measure::insert(&mut tx, &unit).await?;
    if unit.is_default {
        unit_measure::clear_default_except(&mut tx, id).await?;
    }

    commit(tx).await?;
    info!(unit_measure_id = %id, "Unit measure created");
    Ok(id)
}

pub async fn update_unit_measure(state: &AppState, request: UnitMeasureRequest) -> ApiResult<()> {
    debug!(unit_measure_id = %request.id, "Updating unit measure");
    validate_id("id", request.id)?;
    request.validate()?;

    let mut tx = state.db.begin().await?;
    let existing = unit_measure::get(&mut tx, request.id).await?;
    let unit = request.to_unit(existing.id);
    if let Some(other) = unit_measure::find_by_normalized_name(&mut tx, &unit.normalized_name).await? {
        if other.id != existing.id {
            return Err(CoreError::already_exists("Unit measure", "name", &unit.name).into());
        }
    }
    if existing.is_default && !unit.is_default {
        return Err(CoreError::Rule(
            "mark another unit measure as default instead of clearing the flag".to_string(),
        )
        .into());
    }

    unit_measure::update(&mut tx, &unit).await?;
    if unit.is_default {
        unit_measure::clear_default_except(&mut tx, unit.id).await?;
    }

    commit(tx).await?;
    info!(unit_measure_id = %unit.id, "Unit measure updated");
    Ok(())
}

pub async fn list_unit_measures(state: &AppState) -> ApiResult<Vec<UnitMeasure>> {
    let mut conn = state.db.acquire().await?;
    Ok(unit_measure::list(&mut conn).await?)
}

pub async fn delete_unit_measure(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(unit_measure_id = %id, "Deleting unit measure");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;
    let existing = unit_measure::get(&mut tx, id).await?;
    if existing.is_default {
        return Err(
            CoreError::Forbidden("the default unit measure cannot be deleted".to_string()).into(),
        );
    }
    if unit_measure::is_in_use(&mut tx, id).await? {
        return Err(CoreError::Forbidden(format!("unit measure {} is in use", existing.name)).into());
    }
    unit_measure::delete(&mut tx, id).await?;

    commit(tx).await?;
    info!(unit_measure_id = %id, "Unit measure deleted");
    Ok(())
}
