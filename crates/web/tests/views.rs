//! HTTP-level tests for the taxi service pages

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;

use taxi_common::{
    password::hash_password, Database, Driver, EntityId, ListQuery, Manufacturer, NewCar,
    NewDriver, NewManufacturer,
};
use taxi_web::{auth::start_session, TaxiServer, WebConfig};

const FORM: &str = "application/x-www-form-urlencoded";

struct Client {
    server: TaxiServer,
    cookie: Option<String>,
}

impl Client {
    fn anonymous() -> Self {
        let db = Database::open_memory().unwrap();
        Self {
            server: TaxiServer::with_database(db, WebConfig::default()),
            cookie: None,
        }
    }

    /// Client with "test_username" logged in
    fn logged_in() -> (Self, Driver) {
        let mut client = Self::anonymous();
        let user = client.create_driver("test_username", "ABC12346", "Test1234q");
        client.force_login(user.id);
        (client, user)
    }

    fn db(&self) -> Database {
        self.server.state().db.clone()
    }

    fn create_driver(&self, username: &str, license: &str, password: &str) -> Driver {
        self.db()
            .create_driver(&NewDriver {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                license_number: license.to_string(),
                password_hash: hash_password(password),
            })
            .unwrap()
    }

    fn create_manufacturer(&self, name: &str, country: &str) -> Manufacturer {
        self.db()
            .create_manufacturer(&NewManufacturer {
                name: name.to_string(),
                country: country.to_string(),
            })
            .unwrap()
    }

    fn force_login(&mut self, driver_id: EntityId) {
        let state = self.server.state();
        let token = start_session(&state.db, &state.cfg, driver_id).unwrap();
        self.cookie = Some(format!("{}={}", state.cfg.cookie_name, token));
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> Response {
        let builder = match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        };
        self.server
            .router()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().method("GET").uri(uri), Body::empty()).await
    }

    async fn post(&self, uri: &str, form: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, FORM),
            Body::from(form.to_string()),
        )
        .await
    }
}

fn location(resp: &Response) -> &str {
    resp.headers()[header::LOCATION].to_str().unwrap()
}

fn assert_redirects(resp: &Response, to: &str) {
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(resp), to);
}

async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Identity gate
// ============================================================================

#[tokio::test]
async fn test_anonymous_requests_redirect_to_login() {
    let client = Client::anonymous();

    for (uri, target) in [
        ("/", "/accounts/login/?next=%2F"),
        ("/drivers/", "/accounts/login/?next=%2Fdrivers%2F"),
        ("/manufacturers/create/", "/accounts/login/?next=%2Fmanufacturers%2Fcreate%2F"),
        ("/cars/1/", "/accounts/login/?next=%2Fcars%2F1%2F"),
    ] {
        let resp = client.get(uri).await;
        assert_redirects(&resp, target);
    }

    let resp = client.post("/manufacturers/create/", "name=x&country=y").await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(client.db().count_manufacturers().unwrap(), 0);
}

#[tokio::test]
async fn test_login_flow() {
    let mut client = Client::anonymous();
    client.create_driver("test_username", "ABC12346", "Test1234q");

    let resp = client.get("/accounts/login/?next=/cars/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains(r#"name="next" value="/cars/""#));

    let resp = client
        .post("/accounts/login/", "username=test_username&password=Test1234q&next=%2Fcars%2F")
        .await;
    assert_redirects(&resp, "/cars/");

    let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("sessionid="));
    assert!(set_cookie.contains("HttpOnly"));
    client.cookie = set_cookie.split(';').next().map(str::to_string);

    let resp = client.get("/").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let user = client.db().get_driver_by_username("test_username").unwrap().unwrap();
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let client = Client::anonymous();
    client.create_driver("test_username", "ABC12346", "Test1234q");

    let resp = client
        .post("/accounts/login/", "username=test_username&password=wrong")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert!(body_text(resp).await.contains("Please enter a correct username and password"));

    let resp = client.post("/accounts/login/", "username=nobody&password=Test1234q").await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let client = Client::anonymous();
    client.create_driver("test_username", "ABC12346", "Test1234q");

    let resp = client
        .post(
            "/accounts/login/",
            "username=test_username&password=Test1234q&next=https%3A%2F%2Fevil.example%2F",
        )
        .await;
    assert_redirects(&resp, "/");

    // A tab between the slashes is stripped by browsers, leaving `//evil.example`
    let resp = client
        .post(
            "/accounts/login/",
            "username=test_username&password=Test1234q&next=%2F%09%2Fevil.example",
        )
        .await;
    assert_redirects(&resp, "/");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let (client, _) = Client::logged_in();

    let resp = client.post("/accounts/logout/", "").await;
    assert_redirects(&resp, "/accounts/login/");

    let resp = client.get("/").await;
    assert_redirects(&resp, "/accounts/login/?next=%2F");
}

#[tokio::test]
async fn test_expired_session_is_rejected() {
    let (mut client, user) = Client::logged_in();
    let db = client.db();
    db.store_session(&taxi_common::password::hash_token("stale"), user.id, 0).unwrap();
    client.cookie = Some("sessionid=stale".to_string());

    let resp = client.get("/").await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(db
        .get_session(&taxi_common::password::hash_token("stale"))
        .unwrap()
        .is_none());
}

// ============================================================================
// Home
// ============================================================================

#[tokio::test]
async fn test_index_counts_and_visits() {
    let (client, _) = Client::logged_in();
    client.create_manufacturer("test_name", "test_country");

    let body = body_text(client.get("/").await).await;
    assert!(body.contains("<strong>Drivers:</strong> 1"));
    assert!(body.contains("<strong>Manufacturers:</strong> 1"));
    assert!(body.contains("<strong>Cars:</strong> 0"));
    assert!(body.contains("visited this page 1 time."));

    let body = body_text(client.get("/").await).await;
    assert!(body.contains("visited this page 2 times."));
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let (client, _) = Client::logged_in();
    let resp = client.get("/nowhere/").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_id_is_404() {
    let (client, _) = Client::logged_in();
    for uri in ["/cars/abc/", "/drivers/-1/", "/manufacturers/1x/update/"] {
        let resp = client.get(uri).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
    let resp = client.post("/cars/abc/delete/", "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Manufacturers
// ============================================================================

#[tokio::test]
async fn test_successful_manufacturer_creation() {
    let (client, _) = Client::logged_in();

    let resp = client
        .post("/manufacturers/create/", "name=test_name1&country=test_country_1")
        .await;
    assert_redirects(&resp, "/manufacturers/");

    let page = client.db().list_manufacturers(&ListQuery::default()).unwrap();
    assert!(page.items.iter().any(|m| m.name == "test_name1"));
}

#[tokio::test]
async fn test_unsuccessful_manufacturer_creation() {
    let (client, _) = Client::logged_in();

    let resp = client.post("/manufacturers/create/", "name=test").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("This field is required."));
    assert_eq!(client.db().count_manufacturers().unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_manufacturer_name_redisplays_form() {
    let (client, _) = Client::logged_in();
    client.create_manufacturer("test_name", "test_country");

    let resp = client
        .post("/manufacturers/create/", "name=test_name&country=elsewhere")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("Manufacturer with this name already exists."));
    assert_eq!(client.db().count_manufacturers().unwrap(), 1);
}

#[tokio::test]
async fn test_manufacturer_update_redirects_to_success_url() {
    let (client, _) = Client::logged_in();
    let manufacturer = client.create_manufacturer("test_name", "test_country");

    let resp = client.get(&format!("/manufacturers/{}/update/", manufacturer.id)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains(r#"value="test_name""#));

    let resp = client
        .post(
            &format!("/manufacturers/{}/update/", manufacturer.id),
            "name=test_name1&country=test_country_1",
        )
        .await;
    assert_redirects(&resp, "/manufacturers/");

    let updated = client.db().get_manufacturer(manufacturer.id).unwrap().unwrap();
    assert_eq!(updated.country, "test_country_1");
}

#[tokio::test]
async fn test_manufacturer_deletion() {
    let (client, _) = Client::logged_in();
    let manufacturer = client.create_manufacturer("test_name", "test_country");
    let car = client
        .db()
        .create_car(&NewCar {
            model: "test_model".to_string(),
            manufacturer_id: manufacturer.id,
            driver_ids: vec![],
        })
        .unwrap();

    let uri = format!("/manufacturers/{}/delete/", manufacturer.id);
    let resp = client.get(&uri).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.post(&uri, "").await;
    assert_redirects(&resp, "/manufacturers/");
    assert!(!client.db().manufacturer_exists(manufacturer.id).unwrap());
    assert!(!client.db().car_exists(car.id).unwrap());

    let resp = client.post(&uri, "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manufacturer_list_search_and_pages() {
    let (client, _) = Client::logged_in();
    for i in 0..6 {
        client.create_manufacturer(&format!("Maker {}", i), "Country");
    }
    client.create_manufacturer("Tesla", "USA");

    let body = body_text(client.get("/manufacturers/?name=tes").await).await;
    assert!(body.contains("Tesla"));
    assert!(!body.contains("Maker 0"));

    let resp = client.get("/manufacturers/?page=2").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get("/manufacturers/?page=3").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client.get("/manufacturers/?page=").await;
    assert_eq!(resp.status(), StatusCode::OK);

    for uri in ["/manufacturers/?page=abc", "/drivers/?page=abc", "/cars/?page=-1"] {
        let resp = client.get(uri).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

// ============================================================================
// Drivers
// ============================================================================

#[tokio::test]
async fn test_successful_driver_creation() {
    let (client, _) = Client::logged_in();

    let resp = client
        .post(
            "/drivers/create/",
            "username=test&license_number=ABC12345&password1=Test1234q&password2=Test1234q",
        )
        .await;
    let driver = client.db().get_driver_by_username("test").unwrap().unwrap();
    assert_redirects(&resp, &format!("/drivers/{}/", driver.id));
}

#[tokio::test]
async fn test_unsuccessful_driver_creation() {
    let (client, _) = Client::logged_in();

    let resp = client.post("/drivers/create/", "username=test").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(client.db().get_driver_by_username("test").unwrap().is_none());
}

#[tokio::test]
async fn test_driver_creation_rejects_taken_license() {
    let (client, _) = Client::logged_in();

    let resp = client
        .post(
            "/drivers/create/",
            "username=test&license_number=ABC12346&password1=Test1234q&password2=Test1234q",
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("Driver with this license number already exists."));
    assert!(client.db().get_driver_by_username("test").unwrap().is_none());
}

#[tokio::test]
async fn test_driver_creation_form_displayed_on_page() {
    let (client, _) = Client::logged_in();

    let resp = client.get("/drivers/create/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    for field in ["username", "license_number", "password1", "password2"] {
        assert!(body.contains(&format!(r#"name="{}""#, field)), "missing {}", field);
    }
}

#[tokio::test]
async fn test_driver_detail_lists_cars() {
    let (client, user) = Client::logged_in();
    let manufacturer = client.create_manufacturer("test_name", "test_country");
    client
        .db()
        .create_car(&NewCar {
            model: "test_model".to_string(),
            manufacturer_id: manufacturer.id,
            driver_ids: vec![user.id],
        })
        .unwrap();

    let resp = client.get(&format!("/drivers/{}/", user.id)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("test_model"));

    let resp = client.get("/drivers/999/").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_driver_update_redirects_to_success_url() {
    let (client, user) = Client::logged_in();

    let resp = client
        .post(&format!("/drivers/{}/update/", user.id), "license_number=CBA54321")
        .await;
    assert_redirects(&resp, "/drivers/");

    let updated = client.db().get_driver(user.id).unwrap().unwrap();
    assert_eq!(updated.license_number, "CBA54321");
}

#[tokio::test]
async fn test_driver_update_rejects_bad_license() {
    let (client, user) = Client::logged_in();

    let resp = client
        .post(&format!("/drivers/{}/update/", user.id), "license_number=abc12345")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("First 3 characters should be uppercase letters"));

    let unchanged = client.db().get_driver(user.id).unwrap().unwrap();
    assert_eq!(unchanged.license_number, "ABC12346");
}

#[tokio::test]
async fn test_driver_successful_deletion() {
    let (client, _) = Client::logged_in();
    let other = client.create_driver("test", "ABC12345", "Test1234q");

    let resp = client.post(&format!("/drivers/{}/delete/", other.id), "").await;
    assert_redirects(&resp, "/drivers/");
    assert!(!client.db().driver_exists(other.id).unwrap());
}

#[tokio::test]
async fn test_deleting_yourself_ends_the_session() {
    let (client, user) = Client::logged_in();

    let resp = client.post(&format!("/drivers/{}/delete/", user.id), "").await;
    assert_redirects(&resp, "/drivers/");
    assert!(!client.db().driver_exists(user.id).unwrap());

    let resp = client.get("/drivers/").await;
    assert_redirects(&resp, "/accounts/login/?next=%2Fdrivers%2F");
}

// ============================================================================
// Cars
// ============================================================================

/// Logged-in client with one manufacturer and one car driven by the user
fn car_fixture() -> (Client, Driver, Manufacturer, EntityId) {
    let (client, user) = Client::logged_in();
    let manufacturer = client.create_manufacturer("test_name", "test_country");
    let car = client
        .db()
        .create_car(&NewCar {
            model: "test_model".to_string(),
            manufacturer_id: manufacturer.id,
            driver_ids: vec![user.id],
        })
        .unwrap();
    (client, user, manufacturer, car.id)
}

#[tokio::test]
async fn test_successful_car_creation() {
    let (client, user, manufacturer, _) = car_fixture();

    let resp = client
        .post(
            "/cars/create/",
            &format!("model=test&manufacturer={}&drivers={}", manufacturer.id, user.id),
        )
        .await;
    assert_redirects(&resp, "/cars/");
    assert_eq!(client.db().count_cars().unwrap(), 2);
}

#[tokio::test]
async fn test_car_creation_with_several_drivers() {
    let (client, user, manufacturer, _) = car_fixture();
    let other = client.create_driver("other", "XYZ12345", "Test1234q");

    let resp = client
        .post(
            "/cars/create/",
            &format!(
                "model=multi&manufacturer={}&drivers={}&drivers={}",
                manufacturer.id, user.id, other.id
            ),
        )
        .await;
    assert_redirects(&resp, "/cars/");

    let cars = client.db().cars_for_driver(other.id).unwrap();
    assert_eq!(cars.len(), 1);
    assert_eq!(cars[0].drivers.len(), 2);
}

#[tokio::test]
async fn test_unsuccessful_car_creation() {
    let (client, _, _, _) = car_fixture();

    let resp = client.post("/cars/create/", "model=test").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(client.db().count_cars().unwrap(), 1);

    let resp = client.post("/cars/create/", "model=test&manufacturer=99").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("Select a valid choice."));
    assert_eq!(client.db().count_cars().unwrap(), 1);
}

#[tokio::test]
async fn test_car_update_redirects_to_success_url() {
    let (client, user, manufacturer, car_id) = car_fixture();

    let resp = client
        .post(
            &format!("/cars/{}/update/", car_id),
            &format!("model=test&manufacturer={}&drivers={}", manufacturer.id, user.id),
        )
        .await;
    assert_redirects(&resp, "/cars/");
    assert_eq!(client.db().get_car(car_id).unwrap().unwrap().model, "test");
}

#[tokio::test]
async fn test_car_deletion() {
    let (client, _, _, car_id) = car_fixture();

    let resp = client.post(&format!("/cars/{}/delete/", car_id), "").await;
    assert_redirects(&resp, "/cars/");
    assert!(!client.db().car_exists(car_id).unwrap());

    let resp = client.post(&format!("/cars/{}/delete/", car_id), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_assign() {
    let (client, user, _, car_id) = car_fixture();
    let toggle = format!("/cars/{}/toggle-assign/", car_id);
    let detail = format!("/cars/{}/", car_id);

    let body = body_text(client.get(&detail).await).await;
    assert!(body.contains("Delete me from this car"));

    let resp = client.post(&toggle, "").await;
    assert_redirects(&resp, &detail);
    assert!(!client.db().get_car(car_id).unwrap().unwrap().has_driver(user.id));

    let body = body_text(client.get(&detail).await).await;
    assert!(body.contains("Assign me to this car"));

    let resp = client.post(&toggle, "").await;
    assert_redirects(&resp, &detail);
    assert!(client.db().get_car(car_id).unwrap().unwrap().has_driver(user.id));

    let resp = client.post("/cars/999/toggle-assign/", "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_car_list_search() {
    let (client, _, manufacturer, _) = car_fixture();
    client
        .db()
        .create_car(&NewCar {
            model: "Roadster".to_string(),
            manufacturer_id: manufacturer.id,
            driver_ids: vec![],
        })
        .unwrap();

    let body = body_text(client.get("/cars/?model=road").await).await;
    assert!(body.contains("Roadster"));
    assert!(!body.contains("test_model"));
}
