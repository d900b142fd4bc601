//! Driver list, detail, registration, license update and delete

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
    Database, Driver, DriverCreationForm, DriverLicenseUpdateForm, EntityId, Error, FormErrors,
    ListQuery,
};

use super::{found, page_number, path_id, unique_message};
use crate::auth::CurrentDriver;
use crate::error::{AppError, AppResult};
use crate::render;
use crate::server::AppState;
use crate::urls;

const USERNAME_TAKEN: &str = "A user with that username already exists.";

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub username: Option<String>,
    pub page: Option<String>,
}

fn driver_or_404(db: &Database, id: EntityId) -> AppResult<Driver> {
    db.get_driver(id)?
        .ok_or_else(|| Error::not_found("driver", id).into())
}

fn form_errors(err: Error) -> Result<FormErrors, Error> {
    match err {
        Error::AlreadyExists { field, .. } if field == "username" => {
            Ok(FormErrors::single(&field, USERNAME_TAKEN))
        }
        Error::AlreadyExists { kind, field } => {
            Ok(FormErrors::single(&field, unique_message(&kind, &field)))
        }
        other => Err(other),
    }
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Query(params): Query<ListParams>,
) -> AppResult<Response> {
    let page = page_number(params.page.as_deref())?;
    let query = ListQuery::new(params.username, page, state.cfg.page_size);
    let page = state.db.list_drivers(&query)?;
    Ok(render::driver_list(&current.driver, &page, query.search()).into_response())
}

pub async fn detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let driver = driver_or_404(&state.db, id)?;
    let cars = state.db.cars_for_driver(id)?;
    Ok(render::driver_detail(&current.driver, &driver, &cars).into_response())
}

pub async fn create_form_handler(Extension(current): Extension<CurrentDriver>) -> Response {
    render::driver_form(&current.driver, &DriverCreationForm::default(), &FormErrors::new())
        .into_response()
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Form(form): Form<DriverCreationForm>,
) -> AppResult<Response> {
    let new = match form.clean() {
        Ok(new) => new,
        Err(errors) => {
            debug!(errors = %errors, "Driver form rejected");
            return Ok(render::driver_form(&current.driver, &form, &errors).into_response());
        }
    };

    match state.db.create_driver(&new) {
        Ok(driver) => {
            info!(id = driver.id, username = %driver.username, "Registered driver");
            Ok(found(&urls::driver_detail(driver.id)))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            debug!(errors = %errors, "Driver form rejected");
            Ok(render::driver_form(&current.driver, &form, &errors).into_response())
        }
    }
}

pub async fn update_form_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let driver = driver_or_404(&state.db, id)?;
    let form = DriverLicenseUpdateForm {
        license_number: driver.license_number.clone(),
    };
    Ok(render::license_form(&current.driver, &driver, &form, &FormErrors::new()).into_response())
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
    Form(form): Form<DriverLicenseUpdateForm>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let driver = driver_or_404(&state.db, id)?;
    let license_number = match form.clean() {
        Ok(license_number) => license_number,
        Err(errors) => {
            debug!(errors = %errors, "License form rejected");
            let page = render::license_form(&current.driver, &driver, &form, &errors);
            return Ok(page.into_response());
        }
    };

    match state.db.update_license_number(id, &license_number) {
        Ok(_) => {
            info!(id, license_number = %license_number, "Updated driver license");
            Ok(found(urls::DRIVER_LIST))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            Ok(render::license_form(&current.driver, &driver, &form, &errors).into_response())
        }
    }
}

pub async fn confirm_delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let driver = driver_or_404(&state.db, id)?;
    Ok(render::confirm_delete(
        &current.driver,
        "driver",
        &driver.username,
        &urls::driver_delete(id),
        &urls::driver_detail(id),
    )
    .into_response())
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    if !state.db.delete_driver(id)? {
        return Err(AppError::from(Error::not_found("driver", id)));
    }
    info!(id, "Deleted driver");
    Ok(found(urls::DRIVER_LIST))
}
