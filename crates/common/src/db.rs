//! SQLite database for taxi service persistence
//!
//! Tables:
//! - manufacturers: name is unique
//! - drivers: login identities, username and license number unique
//! - cars: one manufacturer each, removed with their manufacturer
//! - car_drivers: many-to-many car <-> driver assignments
//! - sessions: hashed login tokens with a per-session visit counter

use crate::types::{
    Car, Driver, DriverSummary, EntityId, ListQuery, Manufacturer, NewCar, NewDriver,
    NewManufacturer, Page, Session,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Column name of a violated UNIQUE constraint, if that is what failed
fn unique_violation(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            // "UNIQUE constraint failed: drivers.username"
            msg.rsplit('.').next().map(str::to_string)
        }
        _ => None,
    }
}

fn conflict_or(err: rusqlite::Error, kind: &str) -> Error {
    match unique_violation(&err) {
        Some(field) => Error::AlreadyExists {
            kind: kind.to_string(),
            field,
        },
        None => Error::Database(err),
    }
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Manufacturers
            CREATE TABLE IF NOT EXISTS manufacturers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                country TEXT NOT NULL
            );

            -- Drivers (login identities)
            CREATE TABLE IF NOT EXISTS drivers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                license_number TEXT NOT NULL UNIQUE,
                date_joined INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Cars
            CREATE TABLE IF NOT EXISTS cars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model TEXT NOT NULL,
                manufacturer_id INTEGER NOT NULL,
                FOREIGN KEY(manufacturer_id) REFERENCES manufacturers(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_cars_manufacturer ON cars(manufacturer_id);

            -- Car assignments
            CREATE TABLE IF NOT EXISTS car_drivers (
                car_id INTEGER NOT NULL,
                driver_id INTEGER NOT NULL,
                PRIMARY KEY (car_id, driver_id),
                FOREIGN KEY(car_id) REFERENCES cars(id) ON DELETE CASCADE,
                FOREIGN KEY(driver_id) REFERENCES drivers(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_car_drivers_driver ON car_drivers(driver_id);

            -- Login sessions
            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                driver_id INTEGER NOT NULL,
                visits INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY(driver_id) REFERENCES drivers(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    fn exists(&self, table: &str, id: EntityId) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table),
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count(&self, table: &str) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    fn delete(&self, table: &str, id: EntityId) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), params![id])?;

        if rows > 0 {
            debug!("Deleted {} with id {}", table, id);
        }

        Ok(rows > 0)
    }

    // ========================================================================
    // Manufacturer operations
    // ========================================================================

    pub fn create_manufacturer(&self, new: &NewManufacturer) -> Result<Manufacturer> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO manufacturers (name, country) VALUES (?1, ?2)",
            params![new.name, new.country],
        )
        .map_err(|e| conflict_or(e, "manufacturer"))?;

        Ok(Manufacturer {
            id: conn.last_insert_rowid(),
            name: new.name.clone(),
            country: new.country.clone(),
        })
    }

    pub fn get_manufacturer(&self, id: EntityId) -> Result<Option<Manufacturer>> {
        let conn = self.conn.lock();
        let manufacturer = conn
            .query_row(
                "SELECT id, name, country FROM manufacturers WHERE id = ?1",
                params![id],
                manufacturer_from_row,
            )
            .optional()?;
        Ok(manufacturer)
    }

    /// Ordered by name; search matches a substring of the name
    pub fn list_manufacturers(&self, query: &ListQuery) -> Result<Page<Manufacturer>> {
        let conn = self.conn.lock();
        let search = query.search();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM manufacturers
             WHERE ?1 IS NULL OR instr(lower(name), lower(?1)) > 0",
            params![search],
            |row| row.get(0),
        )?;
        let total = total as u64;
        let offset = query
            .offset(total)
            .ok_or_else(|| Error::not_found("page", i64::from(query.page)))?;

        let mut stmt = conn.prepare(
            "SELECT id, name, country FROM manufacturers
             WHERE ?1 IS NULL OR instr(lower(name), lower(?1)) > 0
             ORDER BY name, id LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            params![search, query.per_page, offset as i64],
            manufacturer_from_row,
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Page::new(items, query, total))
    }

    /// Every manufacturer, for choice widgets
    pub fn all_manufacturers(&self) -> Result<Vec<Manufacturer>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, country FROM manufacturers ORDER BY name, id")?;
        let rows = stmt.query_map([], manufacturer_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    pub fn update_manufacturer(&self, id: EntityId, new: &NewManufacturer) -> Result<Manufacturer> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE manufacturers SET name = ?1, country = ?2 WHERE id = ?3",
                params![new.name, new.country, id],
            )
            .map_err(|e| conflict_or(e, "manufacturer"))?;

        if rows == 0 {
            return Err(Error::not_found("manufacturer", id));
        }

        Ok(Manufacturer {
            id,
            name: new.name.clone(),
            country: new.country.clone(),
        })
    }

    /// Cars built by this manufacturer go with it
    pub fn delete_manufacturer(&self, id: EntityId) -> Result<bool> {
        self.delete("manufacturers", id)
    }

    pub fn manufacturer_exists(&self, id: EntityId) -> Result<bool> {
        self.exists("manufacturers", id)
    }

    pub fn count_manufacturers(&self) -> Result<u64> {
        self.count("manufacturers")
    }

    // ========================================================================
    // Driver operations
    // ========================================================================

    pub fn create_driver(&self, new: &NewDriver) -> Result<Driver> {
        let now = now_epoch_secs();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO drivers
                 (username, password_hash, first_name, last_name, license_number, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.username,
                new.password_hash,
                new.first_name,
                new.last_name,
                new.license_number,
                now,
            ],
        )
        .map_err(|e| conflict_or(e, "driver"))?;

        Ok(Driver {
            id: conn.last_insert_rowid(),
            username: new.username.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            license_number: new.license_number.clone(),
            date_joined: now,
            last_login: None,
        })
    }

    pub fn get_driver(&self, id: EntityId) -> Result<Option<Driver>> {
        let conn = self.conn.lock();
        let driver = conn
            .query_row(
                &format!("SELECT {} FROM drivers WHERE id = ?1", DRIVER_COLUMNS),
                params![id],
                driver_from_row,
            )
            .optional()?;
        Ok(driver)
    }

    pub fn get_driver_by_username(&self, username: &str) -> Result<Option<Driver>> {
        let conn = self.conn.lock();
        let driver = conn
            .query_row(
                &format!("SELECT {} FROM drivers WHERE username = ?1", DRIVER_COLUMNS),
                params![username],
                driver_from_row,
            )
            .optional()?;
        Ok(driver)
    }

    /// Driver id and stored password hash for a login attempt
    pub fn get_credentials(&self, username: &str) -> Result<Option<(EntityId, String)>> {
        let conn = self.conn.lock();
        let creds = conn
            .query_row(
                "SELECT id, password_hash FROM drivers WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(creds)
    }

    /// Ordered by id; search matches a substring of the username
    pub fn list_drivers(&self, query: &ListQuery) -> Result<Page<Driver>> {
        let conn = self.conn.lock();
        let search = query.search();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM drivers
             WHERE ?1 IS NULL OR instr(lower(username), lower(?1)) > 0",
            params![search],
            |row| row.get(0),
        )?;
        let total = total as u64;
        let offset = query
            .offset(total)
            .ok_or_else(|| Error::not_found("page", i64::from(query.page)))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM drivers
             WHERE ?1 IS NULL OR instr(lower(username), lower(?1)) > 0
             ORDER BY id LIMIT ?2 OFFSET ?3",
            DRIVER_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![search, query.per_page, offset as i64],
            driver_from_row,
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Page::new(items, query, total))
    }

    /// Every driver, for choice widgets
    pub fn all_drivers(&self) -> Result<Vec<Driver>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM drivers ORDER BY id", DRIVER_COLUMNS))?;
        let rows = stmt.query_map([], driver_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    pub fn update_license_number(&self, id: EntityId, license_number: &str) -> Result<Driver> {
        {
            let conn = self.conn.lock();
            let rows = conn
                .execute(
                    "UPDATE drivers SET license_number = ?1 WHERE id = ?2",
                    params![license_number, id],
                )
                .map_err(|e| conflict_or(e, "driver"))?;

            if rows == 0 {
                return Err(Error::not_found("driver", id));
            }
        }

        self.get_driver(id)?
            .ok_or_else(|| Error::not_found("driver", id))
    }

    pub fn touch_last_login(&self, id: EntityId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE drivers SET last_login = ?1 WHERE id = ?2",
            params![now_epoch_secs(), id],
        )?;
        Ok(())
    }

    /// Assignments and sessions of the driver go with it
    pub fn delete_driver(&self, id: EntityId) -> Result<bool> {
        self.delete("drivers", id)
    }

    pub fn driver_exists(&self, id: EntityId) -> Result<bool> {
        self.exists("drivers", id)
    }

    pub fn count_drivers(&self) -> Result<u64> {
        self.count("drivers")
    }

    // ========================================================================
    // Car operations
    // ========================================================================

    /// Manufacturer and drivers must exist; the insert is all-or-nothing
    pub fn create_car(&self, new: &NewCar) -> Result<Car> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        check_car_references(&tx, new)?;
        tx.execute(
            "INSERT INTO cars (model, manufacturer_id) VALUES (?1, ?2)",
            params![new.model, new.manufacturer_id],
        )?;
        let id = tx.last_insert_rowid();
        replace_car_drivers(&tx, id, &new.driver_ids)?;

        let car = load_car(&tx, id)?
            .ok_or_else(|| Error::Internal(format!("car {} missing after insert", id)))?;
        tx.commit()?;
        Ok(car)
    }

    pub fn get_car(&self, id: EntityId) -> Result<Option<Car>> {
        let conn = self.conn.lock();
        load_car(&conn, id)
    }

    /// Ordered by id; search matches a substring of the model
    pub fn list_cars(&self, query: &ListQuery) -> Result<Page<Car>> {
        let conn = self.conn.lock();
        let search = query.search();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cars
             WHERE ?1 IS NULL OR instr(lower(model), lower(?1)) > 0",
            params![search],
            |row| row.get(0),
        )?;
        let total = total as u64;
        let offset = query
            .offset(total)
            .ok_or_else(|| Error::not_found("page", i64::from(query.page)))?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE ?1 IS NULL OR instr(lower(c.model), lower(?1)) > 0
             ORDER BY c.id LIMIT ?2 OFFSET ?3",
            CAR_SELECT
        ))?;
        let rows = stmt.query_map(params![search, query.per_page, offset as i64], car_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        for car in &mut items {
            car.drivers = car_drivers(&conn, car.id)?;
        }
        Ok(Page::new(items, query, total))
    }

    /// Cars the driver is assigned to
    pub fn cars_for_driver(&self, driver_id: EntityId) -> Result<Vec<Car>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} JOIN car_drivers cd ON cd.car_id = c.id
             WHERE cd.driver_id = ?1 ORDER BY c.id",
            CAR_SELECT
        ))?;
        let rows = stmt.query_map(params![driver_id], car_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        for car in &mut items {
            car.drivers = car_drivers(&conn, car.id)?;
        }
        Ok(items)
    }

    /// Replaces model, manufacturer and the whole driver set
    pub fn update_car(&self, id: EntityId, new: &NewCar) -> Result<Car> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        check_car_references(&tx, new)?;
        let rows = tx.execute(
            "UPDATE cars SET model = ?1, manufacturer_id = ?2 WHERE id = ?3",
            params![new.model, new.manufacturer_id, id],
        )?;
        if rows == 0 {
            return Err(Error::not_found("car", id));
        }
        replace_car_drivers(&tx, id, &new.driver_ids)?;

        let car = load_car(&tx, id)?.ok_or_else(|| Error::not_found("car", id))?;
        tx.commit()?;
        Ok(car)
    }

    /// Flip the driver's assignment to the car; returns whether it is now assigned
    pub fn toggle_assignment(&self, car_id: EntityId, driver_id: EntityId) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let car_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM cars WHERE id = ?1",
            params![car_id],
            |row| row.get(0),
        )?;
        if car_exists == 0 {
            return Err(Error::not_found("car", car_id));
        }

        let removed = tx.execute(
            "DELETE FROM car_drivers WHERE car_id = ?1 AND driver_id = ?2",
            params![car_id, driver_id],
        )?;
        let assigned = if removed == 0 {
            tx.execute(
                "INSERT INTO car_drivers (car_id, driver_id) VALUES (?1, ?2)",
                params![car_id, driver_id],
            )?;
            true
        } else {
            false
        };

        tx.commit()?;
        debug!(car_id, driver_id, assigned, "Toggled car assignment");
        Ok(assigned)
    }

    pub fn delete_car(&self, id: EntityId) -> Result<bool> {
        self.delete("cars", id)
    }

    pub fn car_exists(&self, id: EntityId) -> Result<bool> {
        self.exists("cars", id)
    }

    pub fn count_cars(&self) -> Result<u64> {
        self.count("cars")
    }

    // ========================================================================
    // Session operations
    // ========================================================================

    pub fn store_session(
        &self,
        token_hash: &str,
        driver_id: EntityId,
        expires_at: i64,
    ) -> Result<()> {
        let now = now_epoch_secs();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token_hash, driver_id, visits, created_at, expires_at)
             VALUES (?1, ?2, 0, ?3, ?4)",
            params![token_hash, driver_id, now, expires_at],
        )?;
        Ok(())
    }

    pub fn get_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        let session = conn
            .query_row(
                "SELECT token_hash, driver_id, visits, created_at, expires_at
                 FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| {
                    Ok(Session {
                        token_hash: row.get(0)?,
                        driver_id: row.get(1)?,
                        visits: row.get(2)?,
                        created_at: row.get(3)?,
                        expires_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    /// Bump the visit counter and return the new value
    pub fn record_visit(&self, token_hash: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET visits = visits + 1 WHERE token_hash = ?1",
            params![token_hash],
        )?;
        let visits = conn
            .query_row(
                "SELECT visits FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(visits.unwrap_or(0))
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
        Ok(())
    }

    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let now = now_epoch_secs();
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
        Ok(count)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

const DRIVER_COLUMNS: &str =
    "id, username, first_name, last_name, license_number, date_joined, last_login";

const CAR_SELECT: &str = "SELECT c.id, c.model, m.id, m.name, m.country
     FROM cars c JOIN manufacturers m ON m.id = c.manufacturer_id";

fn manufacturer_from_row(row: &Row<'_>) -> rusqlite::Result<Manufacturer> {
    Ok(Manufacturer {
        id: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
    })
}

fn driver_from_row(row: &Row<'_>) -> rusqlite::Result<Driver> {
    Ok(Driver {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        license_number: row.get(4)?,
        date_joined: row.get(5)?,
        last_login: row.get(6)?,
    })
}

/// Drivers are filled in separately
fn car_from_row(row: &Row<'_>) -> rusqlite::Result<Car> {
    Ok(Car {
        id: row.get(0)?,
        model: row.get(1)?,
        manufacturer: Manufacturer {
            id: row.get(2)?,
            name: row.get(3)?,
            country: row.get(4)?,
        },
        drivers: Vec::new(),
    })
}

fn car_drivers(conn: &Connection, car_id: EntityId) -> Result<Vec<DriverSummary>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.username, d.first_name, d.last_name
         FROM drivers d JOIN car_drivers cd ON cd.driver_id = d.id
         WHERE cd.car_id = ?1 ORDER BY d.id",
    )?;
    let rows = stmt.query_map(params![car_id], |row| {
        Ok(DriverSummary {
            id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
        })
    })?;

    let mut drivers = Vec::new();
    for row in rows {
        drivers.push(row?);
    }
    Ok(drivers)
}

fn load_car(conn: &Connection, id: EntityId) -> Result<Option<Car>> {
    let car = conn
        .query_row(&format!("{} WHERE c.id = ?1", CAR_SELECT), params![id], car_from_row)
        .optional()?;

    match car {
        Some(mut car) => {
            car.drivers = car_drivers(conn, id)?;
            Ok(Some(car))
        }
        None => Ok(None),
    }
}

fn check_car_references(conn: &Connection, new: &NewCar) -> Result<()> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM manufacturers WHERE id = ?1",
        params![new.manufacturer_id],
        |row| row.get(0),
    )?;
    if found == 0 {
        return Err(Error::not_found("manufacturer", new.manufacturer_id));
    }

    for driver_id in &new.driver_ids {
        let found: i64 = conn.query_row(
            "SELECT COUNT(*) FROM drivers WHERE id = ?1",
            params![driver_id],
            |row| row.get(0),
        )?;
        if found == 0 {
            return Err(Error::not_found("driver", *driver_id));
        }
    }
    Ok(())
}

fn replace_car_drivers(conn: &Connection, car_id: EntityId, driver_ids: &[EntityId]) -> Result<()> {
    conn.execute("DELETE FROM car_drivers WHERE car_id = ?1", params![car_id])?;
    for driver_id in driver_ids {
        conn.execute(
            "INSERT OR IGNORE INTO car_drivers (car_id, driver_id) VALUES (?1, ?2)",
            params![car_id, driver_id],
        )?;
    }
    Ok(())
}
