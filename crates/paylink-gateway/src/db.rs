use alloy::primitives::Address;
use paylink::{NetworkMode, ProtocolVersion};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::GatewayError;
use crate::shortcode;

/// Methods a route may be configured with.
pub const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];

/// What a route's `target` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Upstream HTTP origin, reverse-proxied
    Url,
    /// Object-storage key, served as a presigned download
    File,
}

/// How a purchase grants repeat access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    Credit,
    Subscription,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($ty), other)),
                }
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(ResourceType { Url => "url", File => "file" });
text_enum!(PolicyType { Credit => "credit", Subscription => "subscription" });

/// A priced, proxyable resource.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Route {
    pub id: i64,
    pub short_code: String,
    pub owner_id: i64,
    /// Upstream URL, or object-storage key for file routes
    pub target: String,
    pub resource_type: ResourceType,
    pub original_filename: Option<String>,
    pub method: String,
    /// Price in minor units (1e-6 of the settlement currency)
    pub price: u64,
    pub policy: PolicyType,
    /// Credits granted per purchase (credit policy only)
    pub credits: u32,
    pub network: NetworkMode,
    /// Stored protocol version; 0 predates versioning and means v1
    pub protocol_version: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub attempt_count: i64,
    pub payment_count: i64,
    pub access_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl Route {
    pub fn version(&self) -> Result<ProtocolVersion, GatewayError> {
        Ok(ProtocolVersion::from_number(self.protocol_version)?)
    }
}

/// Input to [`Database::create_route`].
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub owner_id: i64,
    pub target: String,
    pub resource_type: ResourceType,
    pub original_filename: Option<String>,
    pub method: String,
    pub price: u64,
    pub policy: PolicyType,
    pub credits: u32,
    pub network: NetworkMode,
    pub protocol_version: u32,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Route owner. Supplies the payee and the secret injected into proxied
/// requests.
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: i64,
    pub payment_address: Option<Address>,
    pub proxy_secret: Option<String>,
    pub created_at: i64,
}

/// SQLite database wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const ROUTE_COLUMNS: &str = "id, short_code, owner_id, target, resource_type, original_filename, \
     method, price, policy, credits, network, protocol_version, title, description, enabled, \
     attempt_count, payment_count, access_count, created_at, updated_at, deleted_at";

fn route_from_row(row: &Row<'_>) -> rusqlite::Result<Route> {
    let network: String = row.get(10)?;
    let network = network.parse::<NetworkMode>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Route {
        id: row.get(0)?,
        short_code: row.get(1)?,
        owner_id: row.get(2)?,
        target: row.get(3)?,
        resource_type: row.get(4)?,
        original_filename: row.get(5)?,
        method: row.get(6)?,
        price: u64::try_from(row.get::<_, i64>(7)?).unwrap_or_default(),
        policy: row.get(8)?,
        credits: row.get(9)?,
        network,
        protocol_version: row.get(11)?,
        title: row.get(12)?,
        description: row.get(13)?,
        enabled: row.get::<_, i32>(14)? == 1,
        attempt_count: row.get(15)?,
        payment_count: row.get(16)?,
        access_count: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
        deleted_at: row.get(20)?,
    })
}

fn owner_from_row(row: &Row<'_>) -> rusqlite::Result<Owner> {
    let address: Option<String> = row.get(1)?;
    let payment_address = address
        .map(|a| a.parse::<Address>())
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
    Ok(Owner {
        id: row.get(0)?,
        payment_address,
        proxy_secret: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl Database {
    pub fn new(path: &str) -> Result<Self, GatewayError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, GatewayError> {
        self.conn
            .lock()
            .map_err(|_| GatewayError::Internal("database lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), GatewayError> {
        let conn = self.lock()?;

        // Enable WAL mode for better concurrent read/write performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS owners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payment_address TEXT,
                proxy_secret TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS routes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT UNIQUE NOT NULL,
                owner_id INTEGER NOT NULL REFERENCES owners(id),
                target TEXT NOT NULL,
                resource_type TEXT NOT NULL DEFAULT 'url',
                original_filename TEXT,
                method TEXT NOT NULL,
                price INTEGER NOT NULL CHECK (price >= 0),
                policy TEXT NOT NULL DEFAULT 'credit',
                credits INTEGER NOT NULL DEFAULT 1 CHECK (credits >= 1),
                network TEXT NOT NULL DEFAULT 'test',
                protocol_version INTEGER NOT NULL DEFAULT 1,
                title TEXT,
                description TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                payment_count INTEGER NOT NULL DEFAULT 0,
                access_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_routes_owner ON routes(owner_id)",
            [],
        )?;

        crate::ledger::init_schema(&conn)?;

        Ok(())
    }

    /// Insert an owner
    pub fn create_owner(
        &self,
        payment_address: Option<Address>,
        proxy_secret: Option<&str>,
    ) -> Result<Owner, GatewayError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();
        let address = payment_address.map(|a| a.to_checksum(None));

        conn.execute(
            "INSERT INTO owners (payment_address, proxy_secret, created_at) VALUES (?1, ?2, ?3)",
            params![address, proxy_secret, now],
        )?;

        Ok(Owner {
            id: conn.last_insert_rowid(),
            payment_address,
            proxy_secret: proxy_secret.map(String::from),
            created_at: now,
        })
    }

    pub fn get_owner(&self, id: i64) -> Result<Option<Owner>, GatewayError> {
        let conn = self.lock()?;
        let owner = conn
            .query_row(
                "SELECT id, payment_address, proxy_secret, created_at FROM owners WHERE id = ?1",
                params![id],
                owner_from_row,
            )
            .optional()?;
        Ok(owner)
    }

    /// Validate and insert a route under a freshly generated short code.
    pub fn create_route(&self, new: &NewRoute) -> Result<Route, GatewayError> {
        let method = new.method.to_ascii_uppercase();
        if !ALLOWED_METHODS.contains(&method.as_str()) {
            return Err(GatewayError::InvalidRoute(format!(
                "unsupported method: {}",
                new.method
            )));
        }
        if new.credits == 0 {
            return Err(GatewayError::InvalidRoute(
                "credits must be at least 1".to_string(),
            ));
        }
        let price = i64::try_from(new.price)
            .map_err(|_| GatewayError::InvalidRoute("price out of range".to_string()))?;
        ProtocolVersion::from_number(new.protocol_version)
            .map_err(|e| GatewayError::InvalidRoute(e.to_string()))?;
        match new.resource_type {
            ResourceType::Url => {
                let url = url::Url::parse(&new.target)
                    .map_err(|e| GatewayError::InvalidRoute(format!("invalid target URL: {e}")))?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(GatewayError::InvalidRoute(
                        "target URL must be http or https".to_string(),
                    ));
                }
            }
            ResourceType::File => {
                if new.target.trim().is_empty() {
                    return Err(GatewayError::InvalidRoute(
                        "file routes need a storage key".to_string(),
                    ));
                }
            }
        }

        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();

        for _ in 0..shortcode::MAX_GENERATION_ATTEMPTS {
            let code = shortcode::generate();
            if code_taken(&conn, &code)? {
                tracing::debug!(short_code = %code, "short code collision, retrying");
                continue;
            }

            conn.execute(
                r#"
                INSERT INTO routes (short_code, owner_id, target, resource_type, original_filename,
                    method, price, policy, credits, network, protocol_version, title, description,
                    enabled, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?14)
                "#,
                params![
                    code,
                    new.owner_id,
                    new.target,
                    new.resource_type,
                    new.original_filename,
                    method,
                    price,
                    new.policy,
                    new.credits,
                    new.network.as_str(),
                    new.protocol_version,
                    new.title,
                    new.description,
                    now,
                ],
            )?;

            let id = conn.last_insert_rowid();
            return Ok(Route {
                id,
                short_code: code,
                owner_id: new.owner_id,
                target: new.target.clone(),
                resource_type: new.resource_type,
                original_filename: new.original_filename.clone(),
                method,
                price: new.price,
                policy: new.policy,
                credits: new.credits,
                network: new.network,
                protocol_version: new.protocol_version,
                title: new.title.clone(),
                description: new.description.clone(),
                enabled: true,
                attempt_count: 0,
                payment_count: 0,
                access_count: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            });
        }

        Err(GatewayError::Internal(
            "could not generate a unique short code".to_string(),
        ))
    }

    pub fn short_code_exists(&self, code: &str) -> Result<bool, GatewayError> {
        let conn = self.lock()?;
        code_taken(&conn, code)
    }

    /// Lookup used for dispatch: disabled and soft-deleted routes never match.
    pub fn find_enabled_route_by_short_code(
        &self,
        code: &str,
    ) -> Result<Option<Route>, GatewayError> {
        let conn = self.lock()?;
        let route = conn
            .query_row(
                &format!(
                    "SELECT {ROUTE_COLUMNS} FROM routes \
                     WHERE short_code = ?1 AND enabled = 1 AND deleted_at IS NULL"
                ),
                params![code],
                route_from_row,
            )
            .optional()?;
        Ok(route)
    }

    /// Lookup by id regardless of state
    pub fn get_route(&self, id: i64) -> Result<Option<Route>, GatewayError> {
        let conn = self.lock()?;
        let route = conn
            .query_row(
                &format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE id = ?1"),
                params![id],
                route_from_row,
            )
            .optional()?;
        Ok(route)
    }

    pub fn set_route_enabled(&self, id: i64, enabled: bool) -> Result<bool, GatewayError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();
        let rows = conn.execute(
            "UPDATE routes SET enabled = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
            params![enabled as i32, now, id],
        )?;
        Ok(rows > 0)
    }

    /// Soft-delete a route owned by `owner_id`. Returns false if there was
    /// nothing to delete.
    pub fn soft_delete_route(&self, id: i64, owner_id: i64) -> Result<bool, GatewayError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();
        let rows = conn.execute(
            r#"
            UPDATE routes SET deleted_at = ?1, updated_at = ?1
            WHERE id = ?2 AND owner_id = ?3 AND deleted_at IS NULL
            "#,
            params![now, id, owner_id],
        )?;
        Ok(rows > 0)
    }

    pub fn increment_attempt_count(&self, route_id: i64) -> Result<(), GatewayError> {
        self.increment_counter(route_id, "attempt_count")
    }

    pub fn increment_payment_count(&self, route_id: i64) -> Result<(), GatewayError> {
        self.increment_counter(route_id, "payment_count")
    }

    pub fn increment_access_count(&self, route_id: i64) -> Result<(), GatewayError> {
        self.increment_counter(route_id, "access_count")
    }

    fn increment_counter(&self, route_id: i64, column: &'static str) -> Result<(), GatewayError> {
        let conn = self.lock()?;
        conn.execute(
            &format!("UPDATE routes SET {column} = {column} + 1 WHERE id = ?1"),
            params![route_id],
        )?;
        Ok(())
    }
}

fn code_taken(conn: &Connection, code: &str) -> Result<bool, GatewayError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM routes WHERE short_code = ?1)",
        params![code],
        |row| row.get(0),
    )?;
    Ok(exists)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn url_route(owner_id: i64) -> NewRoute {
        NewRoute {
            owner_id,
            target: "https://api.example.com/data".to_string(),
            resource_type: ResourceType::Url,
            original_filename: None,
            method: "GET".to_string(),
            price: 10_000,
            policy: PolicyType::Credit,
            credits: 3,
            network: NetworkMode::Test,
            protocol_version: 1,
            title: Some("Weather".to_string()),
            description: None,
        }
    }

    fn setup() -> (Database, Owner) {
        let db = Database::new(":memory:").unwrap();
        let owner = db
            .create_owner(Some(Address::repeat_byte(0x42)), Some("s3cret"))
            .unwrap();
        (db, owner)
    }

    #[test]
    fn test_owner_roundtrip() {
        let (db, owner) = setup();
        let loaded = db.get_owner(owner.id).unwrap().unwrap();
        assert_eq!(loaded.payment_address, Some(Address::repeat_byte(0x42)));
        assert_eq!(loaded.proxy_secret.as_deref(), Some("s3cret"));
        assert!(db.get_owner(999).unwrap().is_none());
    }

    #[test]
    fn test_create_and_find_route() {
        let (db, owner) = setup();
        let route = db.create_route(&url_route(owner.id)).unwrap();
        assert!(shortcode::is_well_formed(&route.short_code));
        assert!(db.short_code_exists(&route.short_code).unwrap());

        let found = db
            .find_enabled_route_by_short_code(&route.short_code)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, route.id);
        assert_eq!(found.price, 10_000);
        assert_eq!(found.policy, PolicyType::Credit);
        assert_eq!(found.resource_type, ResourceType::Url);
        assert_eq!(found.network, NetworkMode::Test);
        assert_eq!(found.version().unwrap(), ProtocolVersion::V1);
    }

    #[test]
    fn test_method_normalized_and_validated() {
        let (db, owner) = setup();
        let mut new = url_route(owner.id);
        new.method = "post".to_string();
        assert_eq!(db.create_route(&new).unwrap().method, "POST");

        new.method = "TRACE".to_string();
        assert!(matches!(
            db.create_route(&new),
            Err(GatewayError::InvalidRoute(_))
        ));
    }

    #[test]
    fn test_invalid_routes_rejected() {
        let (db, owner) = setup();

        let mut zero_credits = url_route(owner.id);
        zero_credits.credits = 0;
        assert!(db.create_route(&zero_credits).is_err());

        let mut bad_target = url_route(owner.id);
        bad_target.target = "ftp://example.com/file".to_string();
        assert!(db.create_route(&bad_target).is_err());

        let mut huge_price = url_route(owner.id);
        huge_price.price = u64::MAX;
        assert!(db.create_route(&huge_price).is_err());

        let mut bad_version = url_route(owner.id);
        bad_version.protocol_version = 7;
        assert!(db.create_route(&bad_version).is_err());
    }

    #[test]
    fn test_disabled_and_deleted_routes_not_matched() {
        let (db, owner) = setup();
        let disabled = db.create_route(&url_route(owner.id)).unwrap();
        let deleted = db.create_route(&url_route(owner.id)).unwrap();

        assert!(db.set_route_enabled(disabled.id, false).unwrap());
        assert!(db.soft_delete_route(deleted.id, owner.id).unwrap());

        assert!(db
            .find_enabled_route_by_short_code(&disabled.short_code)
            .unwrap()
            .is_none());
        assert!(db
            .find_enabled_route_by_short_code(&deleted.short_code)
            .unwrap()
            .is_none());

        // Soft delete keeps the row
        let row = db.get_route(deleted.id).unwrap().unwrap();
        assert!(row.deleted_at.is_some());
        // Short codes of deleted routes stay reserved
        assert!(db.short_code_exists(&deleted.short_code).unwrap());
    }

    #[test]
    fn test_soft_delete_requires_owner() {
        let (db, owner) = setup();
        let route = db.create_route(&url_route(owner.id)).unwrap();
        assert!(!db.soft_delete_route(route.id, owner.id + 1).unwrap());
        assert!(db.soft_delete_route(route.id, owner.id).unwrap());
        assert!(!db.soft_delete_route(route.id, owner.id).unwrap());
    }

    #[test]
    fn test_counters_are_monotonic() {
        let (db, owner) = setup();
        let route = db.create_route(&url_route(owner.id)).unwrap();

        db.increment_attempt_count(route.id).unwrap();
        db.increment_attempt_count(route.id).unwrap();
        db.increment_payment_count(route.id).unwrap();
        db.increment_access_count(route.id).unwrap();
        db.increment_access_count(route.id).unwrap();
        db.increment_access_count(route.id).unwrap();

        let row = db.get_route(route.id).unwrap().unwrap();
        assert_eq!(row.attempt_count, 2);
        assert_eq!(row.payment_count, 1);
        assert_eq!(row.access_count, 3);
    }

    #[test]
    fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paylink.db");
        let path = path.to_str().unwrap();

        let code = {
            let db = Database::new(path).unwrap();
            let owner = db.create_owner(None, None).unwrap();
            db.create_route(&url_route(owner.id)).unwrap().short_code
        };

        let reopened = Database::new(path).unwrap();
        assert!(reopened
            .find_enabled_route_by_short_code(&code)
            .unwrap()
            .is_some());
    }
}
