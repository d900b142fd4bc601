//! Server-rendered HTML pages
//!
//! Every page is a plain string built from the shared layout. All user
//! supplied text goes through `escape`.

use axum::response::Html;
use taxi_common::{
    Car, CarForm, Driver, DriverCreationForm, DriverLicenseUpdateForm, FormErrors, LoginForm,
    Manufacturer, ManufacturerForm, Page,
};

use crate::urls;

/// Counters shown on the home page
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexCounts {
    pub drivers: u64,
    pub cars: u64,
    pub manufacturers: u64,
    pub visits: i64,
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&Driver>, body: &str) -> Html<String> {
    let nav = match user {
        Some(user) => format!(
            r#"<nav>
  <a href="{index}">Home</a>
  <a href="{manufacturers}">Manufacturers</a>
  <a href="{cars}">Cars</a>
  <a href="{drivers}">Drivers</a>
  <span class="user">User: <a href="{me}">{username}</a></span>
  <form method="post" action="{logout}" class="inline"><button type="submit">Logout</button></form>
</nav>"#,
            index = urls::INDEX,
            manufacturers = urls::MANUFACTURER_LIST,
            cars = urls::CAR_LIST,
            drivers = urls::DRIVER_LIST,
            me = urls::driver_detail(user.id),
            username = escape(&user.username),
            logout = urls::LOGOUT,
        ),
        None => format!(r#"<nav><a href="{}">Login</a></nav>"#, urls::LOGIN),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | Taxi Service</title>
</head>
<body>
{nav}
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        nav = nav,
        body = body,
    ))
}

fn error_list(messages: &[String]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let items: String = messages
        .iter()
        .map(|m| format!("<li>{}</li>", escape(m)))
        .collect();
    format!(r#"<ul class="errorlist">{}</ul>"#, items)
}

fn non_field_errors(errors: &FormErrors) -> String {
    error_list(errors.non_field())
}

fn input(name: &str, label: &str, input_type: &str, value: &str, errors: &FormErrors) -> String {
    format!(
        r#"<p>
  <label for="id_{name}">{label}:</label>
  <input type="{input_type}" name="{name}" id="id_{name}" value="{value}">
  {errors}
</p>
"#,
        name = name,
        label = escape(label),
        input_type = input_type,
        value = escape(value),
        errors = error_list(errors.get(name)),
    )
}

fn password_input(name: &str, label: &str, errors: &FormErrors) -> String {
    // Passwords are never echoed back
    input(name, label, "password", "", errors)
}

fn search_form(action: &str, param: &str, placeholder: &str, search: Option<&str>) -> String {
    format!(
        r#"<form method="get" action="{action}" class="search">
  <input type="text" name="{param}" placeholder="{placeholder}" value="{value}">
  <button type="submit">Search</button>
</form>
"#,
        action = action,
        param = param,
        placeholder = escape(placeholder),
        value = escape(search.unwrap_or("")),
    )
}

fn pagination<T>(page: &Page<T>, base: &str, param: &str, search: Option<&str>) -> String {
    if !page.is_paginated() {
        return String::new();
    }

    let link = |number: u32| match search {
        Some(s) => format!(
            "{}?{}={}&amp;page={}",
            base,
            param,
            escape(&urlencoding::encode(s)),
            number
        ),
        None => format!("{}?page={}", base, number),
    };

    let mut html = String::from(r#"<div class="pagination">"#);
    if page.has_previous() {
        html.push_str(&format!(r#"<a href="{}">prev</a> "#, link(page.number - 1)));
    }
    html.push_str(&format!(
        r#"<span class="current">{} of {}</span>"#,
        page.number, page.num_pages
    ));
    if page.has_next() {
        html.push_str(&format!(r#" <a href="{}">next</a>"#, link(page.number + 1)));
    }
    html.push_str("</div>\n");
    html
}

// ============================================================================
// Home and login
// ============================================================================

pub fn index(user: &Driver, counts: IndexCounts) -> Html<String> {
    let body = format!(
        r#"<h1>Taxi Service Home</h1>
<p>Dynamic content</p>
<ul>
  <li><strong>Drivers:</strong> {drivers}</li>
  <li><strong>Cars:</strong> {cars}</li>
  <li><strong>Manufacturers:</strong> {manufacturers}</li>
</ul>
<p>You have visited this page {visits} time{plural}.</p>
"#,
        drivers = counts.drivers,
        cars = counts.cars,
        manufacturers = counts.manufacturers,
        visits = counts.visits,
        plural = if counts.visits == 1 { "" } else { "s" },
    );
    layout("Home", Some(user), &body)
}

pub fn login(form: &LoginForm, errors: &FormErrors, next: Option<&str>) -> Html<String> {
    let next_field = match next {
        Some(n) => format!(r#"<input type="hidden" name="next" value="{}">"#, escape(n)),
        None => String::new(),
    };
    let body = format!(
        r#"<h1>Login</h1>
<form method="post" action="{action}">
{non_field}{username}{password}{next_field}
<button type="submit">Login</button>
</form>
"#,
        action = urls::LOGIN,
        non_field = non_field_errors(errors),
        username = input("username", "Username", "text", &form.username, errors),
        password = password_input("password", "Password", errors),
        next_field = next_field,
    );
    layout("Login", None, &body)
}

pub fn confirm_delete(
    user: &Driver,
    kind: &str,
    label: &str,
    action: &str,
    cancel: &str,
) -> Html<String> {
    let body = format!(
        r#"<h1>Delete {kind}?</h1>
<p>Are you sure you want to delete {kind} "{label}"?</p>
<form method="post" action="{action}">
  <button type="submit">Yes, delete</button>
  <a href="{cancel}">Cancel</a>
</form>
"#,
        kind = escape(kind),
        label = escape(label),
        action = action,
        cancel = cancel,
    );
    layout(&format!("Delete {}", kind), Some(user), &body)
}

// ============================================================================
// Manufacturers
// ============================================================================

pub fn manufacturer_list(
    user: &Driver,
    page: &Page<Manufacturer>,
    search: Option<&str>,
) -> Html<String> {
    let mut body = format!(
        "<h1>Manufacturer list <a href=\"{}\">+</a></h1>\n{}",
        urls::MANUFACTURER_CREATE,
        search_form(urls::MANUFACTURER_LIST, "name", "Search by name", search),
    );

    if page.items.is_empty() {
        body.push_str("<p>There are no manufacturers in taxi service.</p>\n");
    } else {
        body.push_str(
            "<table>\n<tr><th>ID</th><th>Name</th><th>Country</th><th></th><th></th></tr>\n",
        );
        for m in &page.items {
            body.push_str(&format!(
                r#"<tr><td>{id}</td><td>{name}</td><td>{country}</td><td><a href="{update}">Update</a></td><td><a href="{delete}">Delete</a></td></tr>
"#,
                id = m.id,
                name = escape(&m.name),
                country = escape(&m.country),
                update = urls::manufacturer_update(m.id),
                delete = urls::manufacturer_delete(m.id),
            ));
        }
        body.push_str("</table>\n");
    }
    body.push_str(&pagination(page, urls::MANUFACTURER_LIST, "name", search));

    layout("Manufacturers", Some(user), &body)
}

pub fn manufacturer_form(
    user: &Driver,
    form: &ManufacturerForm,
    errors: &FormErrors,
    action: &str,
    is_update: bool,
) -> Html<String> {
    let title = if is_update { "Update manufacturer" } else { "Create manufacturer" };
    let body = format!(
        r#"<h1>{title}</h1>
<form method="post" action="{action}">
{non_field}{name}{country}
<button type="submit">Submit</button>
</form>
"#,
        title = title,
        action = action,
        non_field = non_field_errors(errors),
        name = input("name", "Name", "text", &form.name, errors),
        country = input("country", "Country", "text", &form.country, errors),
    );
    layout(title, Some(user), &body)
}

// ============================================================================
// Drivers
// ============================================================================

pub fn driver_list(user: &Driver, page: &Page<Driver>, search: Option<&str>) -> Html<String> {
    let mut body = format!(
        "<h1>Driver list <a href=\"{}\">+</a></h1>\n{}",
        urls::DRIVER_CREATE,
        search_form(urls::DRIVER_LIST, "username", "Search by username", search),
    );

    if page.items.is_empty() {
        body.push_str("<p>There are no drivers in taxi service.</p>\n");
    } else {
        body.push_str("<ul>\n");
        for d in &page.items {
            let me = if d.id == user.id { " (Me)" } else { "" };
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a> ({}){}</li>\n",
                urls::driver_detail(d.id),
                escape(&d.username),
                escape(&d.full_name()),
                me,
            ));
        }
        body.push_str("</ul>\n");
    }
    body.push_str(&pagination(page, urls::DRIVER_LIST, "username", search));

    layout("Drivers", Some(user), &body)
}

pub fn driver_detail(user: &Driver, driver: &Driver, cars: &[Car]) -> Html<String> {
    let mut body = format!(
        r#"<h1>{username} <a href="{update}">Update license</a> <a href="{delete}">Delete</a></h1>
<p><strong>First name:</strong> {first}</p>
<p><strong>Last name:</strong> {last}</p>
<p><strong>License number:</strong> {license}</p>
<h2>Cars</h2>
"#,
        username = escape(&driver.username),
        update = urls::driver_update(driver.id),
        delete = urls::driver_delete(driver.id),
        first = escape(&driver.first_name),
        last = escape(&driver.last_name),
        license = escape(&driver.license_number),
    );

    if cars.is_empty() {
        body.push_str("<p>No cars!</p>\n");
    } else {
        body.push_str("<ul>\n");
        for car in cars {
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a> ({})</li>\n",
                urls::car_detail(car.id),
                escape(&car.model),
                escape(&car.manufacturer.name),
            ));
        }
        body.push_str("</ul>\n");
    }

    layout(&driver.username, Some(user), &body)
}

pub fn driver_form(user: &Driver, form: &DriverCreationForm, errors: &FormErrors) -> Html<String> {
    let body = format!(
        r#"<h1>Create driver</h1>
<form method="post" action="{action}">
{non_field}{username}{first}{last}{license}{p1}{p2}
<button type="submit">Submit</button>
</form>
"#,
        action = urls::DRIVER_CREATE,
        non_field = non_field_errors(errors),
        username = input("username", "Username", "text", &form.username, errors),
        first = input("first_name", "First name", "text", &form.first_name, errors),
        last = input("last_name", "Last name", "text", &form.last_name, errors),
        license = input("license_number", "License number", "text", &form.license_number, errors),
        p1 = password_input("password1", "Password", errors),
        p2 = password_input("password2", "Password confirmation", errors),
    );
    layout("Create driver", Some(user), &body)
}

pub fn license_form(
    user: &Driver,
    driver: &Driver,
    form: &DriverLicenseUpdateForm,
    errors: &FormErrors,
) -> Html<String> {
    let body = format!(
        r#"<h1>Update license of {username}</h1>
<form method="post" action="{action}">
{non_field}{license}
<button type="submit">Submit</button>
</form>
"#,
        username = escape(&driver.username),
        action = urls::driver_update(driver.id),
        non_field = non_field_errors(errors),
        license = input("license_number", "License number", "text", &form.license_number, errors),
    );
    layout("Update license", Some(user), &body)
}

// ============================================================================
// Cars
// ============================================================================

pub fn car_list(user: &Driver, page: &Page<Car>, search: Option<&str>) -> Html<String> {
    let mut body = format!(
        "<h1>Car list <a href=\"{}\">+</a></h1>\n{}",
        urls::CAR_CREATE,
        search_form(urls::CAR_LIST, "model", "Search by model", search),
    );

    if page.items.is_empty() {
        body.push_str("<p>There are no cars in taxi service.</p>\n");
    } else {
        body.push_str("<ul>\n");
        for car in &page.items {
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a> ({})</li>\n",
                urls::car_detail(car.id),
                escape(&car.model),
                escape(&car.manufacturer.name),
            ));
        }
        body.push_str("</ul>\n");
    }
    body.push_str(&pagination(page, urls::CAR_LIST, "model", search));

    layout("Cars", Some(user), &body)
}

pub fn car_detail(user: &Driver, car: &Car) -> Html<String> {
    let mut body = format!(
        r#"<h1>{model} <a href="{update}">Update</a> <a href="{delete}">Delete</a></h1>
<p><strong>Manufacturer:</strong> {manufacturer} ({country})</p>
<h2>Drivers</h2>
"#,
        model = escape(&car.model),
        update = urls::car_update(car.id),
        delete = urls::car_delete(car.id),
        manufacturer = escape(&car.manufacturer.name),
        country = escape(&car.manufacturer.country),
    );

    if car.drivers.is_empty() {
        body.push_str("<p>No drivers assigned.</p>\n");
    } else {
        body.push_str("<ul>\n");
        for d in &car.drivers {
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a> ({} {})</li>\n",
                urls::driver_detail(d.id),
                escape(&d.username),
                escape(&d.first_name),
                escape(&d.last_name),
            ));
        }
        body.push_str("</ul>\n");
    }

    let label = if car.has_driver(user.id) {
        "Delete me from this car"
    } else {
        "Assign me to this car"
    };
    body.push_str(&format!(
        r#"<form method="post" action="{}"><button type="submit">{}</button></form>
"#,
        urls::toggle_car_assign(car.id),
        label,
    ));

    layout(&car.model, Some(user), &body)
}

pub fn car_form(
    user: &Driver,
    form: &CarForm,
    errors: &FormErrors,
    manufacturers: &[Manufacturer],
    drivers: &[Driver],
    action: &str,
    is_update: bool,
) -> Html<String> {
    let title = if is_update { "Update car" } else { "Create car" };

    let mut options = String::from("<option value=\"\">---------</option>\n");
    for m in manufacturers {
        let selected = if form.manufacturer.trim() == m.id.to_string() { " selected" } else { "" };
        options.push_str(&format!(
            "<option value=\"{}\"{}>{} {}</option>\n",
            m.id,
            selected,
            escape(&m.name),
            escape(&m.country),
        ));
    }

    let mut checkboxes = String::new();
    for d in drivers {
        let checked = if form.selected_driver(d.id) { " checked" } else { "" };
        checkboxes.push_str(&format!(
            "<label><input type=\"checkbox\" name=\"drivers\" value=\"{}\"{}> {} ({})</label><br>\n",
            d.id,
            checked,
            escape(&d.username),
            escape(&d.full_name()),
        ));
    }

    let body = format!(
        r#"<h1>{title}</h1>
<form method="post" action="{action}">
{non_field}{model}<p>
  <label for="id_manufacturer">Manufacturer:</label>
  <select name="manufacturer" id="id_manufacturer">
{options}  </select>
  {manufacturer_errors}
</p>
<fieldset>
  <legend>Drivers</legend>
{checkboxes}  {driver_errors}
</fieldset>
<button type="submit">Submit</button>
</form>
"#,
        title = title,
        action = action,
        non_field = non_field_errors(errors),
        model = input("model", "Model", "text", &form.model, errors),
        options = options,
        manufacturer_errors = error_list(errors.get("manufacturer")),
        checkboxes = checkboxes,
        driver_errors = error_list(errors.get("drivers")),
    );
    layout(title, Some(user), &body)
}
