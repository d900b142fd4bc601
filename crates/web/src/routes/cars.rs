//! Car list, detail, create, update, delete and the driver assignment toggle

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
    validation::INVALID_CHOICE, Car, CarForm, Database, EntityId, Error, FormErrors, ListQuery,
};

use super::{found, page_number, path_id};
use crate::auth::CurrentDriver;
use crate::error::{AppError, AppResult};
use crate::render;
use crate::server::AppState;
use crate::urls;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub model: Option<String>,
    pub page: Option<String>,
}

fn car_or_404(db: &Database, id: EntityId) -> AppResult<Car> {
    db.get_car(id)?.ok_or_else(|| Error::not_found("car", id).into())
}

/// A manufacturer or driver that vanished between render and submit is a
/// bad choice on the form, not a missing page
fn form_errors(err: Error) -> Result<FormErrors, Error> {
    match err {
        Error::NotFound { kind, .. } if kind == "manufacturer" => {
            Ok(FormErrors::single("manufacturer", INVALID_CHOICE))
        }
        Error::NotFound { kind, id } if kind == "driver" => Ok(FormErrors::single(
            "drivers",
            format!("Select a valid choice. {} is not one of the available choices.", id),
        )),
        other => Err(other),
    }
}

/// Render the car form with the current manufacturer and driver choices
fn car_form_page(
    db: &Database,
    current: &CurrentDriver,
    form: &CarForm,
    errors: &FormErrors,
    action: &str,
    is_update: bool,
) -> AppResult<Response> {
    if !errors.is_empty() {
        debug!(errors = %errors, "Car form rejected");
    }
    let manufacturers = db.all_manufacturers()?;
    let drivers = db.all_drivers()?;
    Ok(render::car_form(
        &current.driver,
        form,
        errors,
        &manufacturers,
        &drivers,
        action,
        is_update,
    )
    .into_response())
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Query(params): Query<ListParams>,
) -> AppResult<Response> {
    let page = page_number(params.page.as_deref())?;
    let query = ListQuery::new(params.model, page, state.cfg.page_size);
    let page = state.db.list_cars(&query)?;
    Ok(render::car_list(&current.driver, &page, query.search()).into_response())
}

pub async fn detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let car = car_or_404(&state.db, id)?;
    Ok(render::car_detail(&current.driver, &car).into_response())
}

pub async fn create_form_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
) -> AppResult<Response> {
    car_form_page(
        &state.db,
        &current,
        &CarForm::default(),
        &FormErrors::new(),
        urls::CAR_CREATE,
        false,
    )
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Form(form): Form<CarForm>,
) -> AppResult<Response> {
    let action = urls::CAR_CREATE;
    let new = match form.clean() {
        Ok(new) => new,
        Err(errors) => return car_form_page(&state.db, &current, &form, &errors, action, false),
    };

    match state.db.create_car(&new) {
        Ok(car) => {
            info!(id = car.id, model = %car.model, drivers = car.drivers.len(), "Created car");
            Ok(found(urls::CAR_LIST))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            car_form_page(&state.db, &current, &form, &errors, action, false)
        }
    }
}

pub async fn update_form_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let car = car_or_404(&state.db, id)?;
    let form = CarForm {
        model: car.model,
        manufacturer: car.manufacturer.id.to_string(),
        drivers: car.drivers.iter().map(|d| d.id.to_string()).collect(),
    };
    car_form_page(
        &state.db,
        &current,
        &form,
        &FormErrors::new(),
        &urls::car_update(id),
        true,
    )
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
    Form(form): Form<CarForm>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    car_or_404(&state.db, id)?;
    let action = urls::car_update(id);
    let new = match form.clean() {
        Ok(new) => new,
        Err(errors) => return car_form_page(&state.db, &current, &form, &errors, &action, true),
    };

    match state.db.update_car(id, &new) {
        Ok(car) => {
            info!(id, model = %car.model, drivers = car.drivers.len(), "Updated car");
            Ok(found(urls::CAR_LIST))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            car_form_page(&state.db, &current, &form, &errors, &action, true)
        }
    }
}

pub async fn confirm_delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let car = car_or_404(&state.db, id)?;
    Ok(render::confirm_delete(
        &current.driver,
        "car",
        &car.model,
        &urls::car_delete(id),
        &urls::car_detail(id),
    )
    .into_response())
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    if !state.db.delete_car(id)? {
        return Err(AppError::from(Error::not_found("car", id)));
    }
    info!(id, "Deleted car");
    Ok(found(urls::CAR_LIST))
}

/// Add or remove the logged-in driver from the car's drivers
pub async fn toggle_assign_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = path_id(&id)?;
    let assigned = state.db.toggle_assignment(id, current.driver.id)?;
    info!(
        car_id = id,
        driver_id = current.driver.id,
        assigned,
        "Toggled car assignment"
    );
    Ok(found(&urls::car_detail(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_references_become_field_errors() {
        let errors = form_errors(Error::not_found("manufacturer", 9)).unwrap();
        assert_eq!(errors.get("manufacturer"), [INVALID_CHOICE]);

        let errors = form_errors(Error::not_found("driver", 4)).unwrap();
        assert_eq!(
            errors.get("drivers"),
            ["Select a valid choice. 4 is not one of the available choices."]
        );

        assert!(form_errors(Error::not_found("car", 1)).is_err());
    }
}
