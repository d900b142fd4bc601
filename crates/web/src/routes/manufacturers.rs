//! Manufacturer list, create, update and delete

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::Form;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use taxi_common::{
    Database, EntityId, Error, FormErrors, ListQuery, Manufacturer, ManufacturerForm,
};

use super::{found, page_number, path_id, unique_message};
use crate::auth::CurrentDriver;
use crate::error::{AppError, AppResult};
use crate::render;
use crate::server::AppState;
use crate::urls;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
    pub page: Option<String>,
}

fn manufacturer_or_404(db: &Database, id: EntityId) -> AppResult<Manufacturer> {
    db.get_manufacturer(id)?
        .ok_or_else(|| Error::not_found("manufacturer", id).into())
}

/// Turn a store rejection into field errors, or pass it on
fn form_errors(err: Error) -> Result<FormErrors, Error> {
    match err {
        Error::AlreadyExists { kind, field } => {
            Ok(FormErrors::single(&field, unique_message(&kind, &field)))
        }
        other => Err(other),
    }
}

fn redisplay(
    current: &CurrentDriver,
    form: &ManufacturerForm,
    errors: &FormErrors,
    action: &str,
    is_update: bool,
) -> Response {
    debug!(errors = %errors, "Manufacturer form rejected");
    render::manufacturer_form(&current.driver, form, errors, action, is_update).into_response()
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Query(params): Query<ListParams>,
) -> AppResult<Response> {
    let page = page_number(params.page.as_deref())?;
    let query = ListQuery::new(params.name, page, state.cfg.page_size);
    let page = state.db.list_manufacturers(&query)?;
    Ok(render::manufacturer_list(&current.driver, &page, query.search()).into_response())
}

pub async fn create_form_handler(Extension(current): Extension<CurrentDriver>) -> Response {
    render::manufacturer_form(
        &current.driver,
        &ManufacturerForm::default(),
        &FormErrors::new(),
        urls::MANUFACTURER_CREATE,
        false,
    )
    .into_response()
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Form(form): Form<ManufacturerForm>,
) -> AppResult<Response> {
    let action = urls::MANUFACTURER_CREATE;
    let new = match form.clean() {
        Ok(new) => new,
        Err(errors) => return Ok(redisplay(&current, &form, &errors, action, false)),
    };

    match state.db.create_manufacturer(&new) {
        Ok(manufacturer) => {
            info!(id = manufacturer.id, name = %manufacturer.name, "Created manufacturer");
            Ok(found(urls::MANUFACTURER_LIST))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            Ok(redisplay(&current, &form, &errors, action, false))
        }
    }
}

pub async fn update_form_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let manufacturer = manufacturer_or_404(&state.db, id)?;
    let form = ManufacturerForm {
        name: manufacturer.name,
        country: manufacturer.country,
    };
    Ok(render::manufacturer_form(
        &current.driver,
        &form,
        &FormErrors::new(),
        &urls::manufacturer_update(id),
        true,
    )
    .into_response())
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
    Form(form): Form<ManufacturerForm>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    manufacturer_or_404(&state.db, id)?;
    let action = urls::manufacturer_update(id);
    let new = match form.clean() {
        Ok(new) => new,
        Err(errors) => return Ok(redisplay(&current, &form, &errors, &action, true)),
    };

    match state.db.update_manufacturer(id, &new) {
        Ok(manufacturer) => {
            info!(id, name = %manufacturer.name, "Updated manufacturer");
            Ok(found(urls::MANUFACTURER_LIST))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            Ok(redisplay(&current, &form, &errors, &action, true))
        }
    }
}

pub async fn confirm_delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let manufacturer = manufacturer_or_404(&state.db, id)?;
    Ok(render::confirm_delete(
        &current.driver,
        "manufacturer",
        &manufacturer.name,
        &urls::manufacturer_delete(id),
        urls::MANUFACTURER_LIST,
    )
    .into_response())
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    if !state.db.delete_manufacturer(id)? {
        return Err(AppError::from(Error::not_found("manufacturer", id)));
    }
    info!(id, "Deleted manufacturer and its cars");
    Ok(found(urls::MANUFACTURER_LIST))
}
