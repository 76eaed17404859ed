//! Purchase Ledger: durable receipts of settled payments, keyed per route by
//! the proof token that paid for them.
//!
//! Rows are never deleted. The only mutation after insert is the guarded
//! `credits_used` increment in [`Database::try_use_credit`].

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{Database, PolicyType};
use crate::error::GatewayError;

/// A completed payment.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Purchase {
    pub id: i64,
    pub route_id: i64,
    pub short_code: String,
    /// Minor units actually charged
    pub price: u64,
    pub policy: PolicyType,
    pub credits_available: u32,
    pub credits_used: u32,
    /// Payee address the payment went to
    pub paid_to: String,
    /// Exact proof header value; the idempotency key
    pub proof_token: String,
    /// Decoded proof JSON, for audit
    pub payment_payload: String,
    /// Facilitator settle response JSON, for audit
    pub settle_response: String,
    pub network: String,
    pub created_at: i64,
}

impl Purchase {
    pub fn credits_remaining(&self) -> u32 {
        self.credits_available.saturating_sub(self.credits_used)
    }

    /// Subscription window end, exclusive.
    pub fn expires_at(&self, period_secs: i64) -> i64 {
        self.created_at.saturating_add(period_secs)
    }
}

/// Input to [`Database::create_purchase`]. `credits_used` always starts at 1.
#[derive(Debug, Clone)]
pub struct NewPurchase<'a> {
    pub route_id: i64,
    pub short_code: &'a str,
    pub price: u64,
    pub policy: PolicyType,
    pub credits_available: u32,
    pub paid_to: &'a str,
    pub proof_token: &'a str,
    pub payment_payload: &'a str,
    pub settle_response: &'a str,
    pub network: &'a str,
    pub created_at: i64,
}

const PURCHASE_COLUMNS: &str = "id, route_id, short_code, price, policy, credits_available, \
     credits_used, paid_to, proof_token, payment_payload, settle_response, network, created_at";

fn purchase_from_row(row: &Row<'_>) -> rusqlite::Result<Purchase> {
    Ok(Purchase {
        id: row.get(0)?,
        route_id: row.get(1)?,
        short_code: row.get(2)?,
        price: u64::try_from(row.get::<_, i64>(3)?).unwrap_or_default(),
        policy: row.get(4)?,
        credits_available: row.get(5)?,
        credits_used: row.get(6)?,
        paid_to: row.get(7)?,
        proof_token: row.get(8)?,
        payment_payload: row.get(9)?,
        settle_response: row.get(10)?,
        network: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub(crate) fn init_schema(conn: &Connection) -> Result<(), GatewayError> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS purchases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            route_id INTEGER NOT NULL REFERENCES routes(id),
            short_code TEXT NOT NULL,
            price INTEGER NOT NULL,
            policy TEXT NOT NULL,
            credits_available INTEGER NOT NULL,
            credits_used INTEGER NOT NULL DEFAULT 1,
            paid_to TEXT NOT NULL,
            proof_token TEXT NOT NULL,
            payment_payload TEXT NOT NULL,
            settle_response TEXT NOT NULL,
            network TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (route_id, proof_token),
            CHECK (credits_used <= credits_available)
        )
        "#,
        [],
    )?;
    Ok(())
}

impl Database {
    /// Record a settled payment.
    pub fn create_purchase(&self, new: &NewPurchase<'_>) -> Result<Purchase, GatewayError> {
        let price = i64::try_from(new.price)
            .map_err(|_| GatewayError::Internal("purchase price out of range".to_string()))?;
        let credits_available = new.credits_available.max(1);

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO purchases (route_id, short_code, price, policy, credits_available,
                credits_used, paid_to, proof_token, payment_payload, settle_response, network,
                created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                new.route_id,
                new.short_code,
                price,
                new.policy,
                credits_available,
                new.paid_to,
                new.proof_token,
                new.payment_payload,
                new.settle_response,
                new.network,
                new.created_at,
            ],
        )?;

        Ok(Purchase {
            id: conn.last_insert_rowid(),
            route_id: new.route_id,
            short_code: new.short_code.to_string(),
            price: new.price,
            policy: new.policy,
            credits_available,
            credits_used: 1,
            paid_to: new.paid_to.to_string(),
            proof_token: new.proof_token.to_string(),
            payment_payload: new.payment_payload.to_string(),
            settle_response: new.settle_response.to_string(),
            network: new.network.to_string(),
            created_at: new.created_at,
        })
    }

    pub fn find_purchase_by_route_and_proof(
        &self,
        route_id: i64,
        proof_token: &str,
    ) -> Result<Option<Purchase>, GatewayError> {
        let conn = self.lock()?;
        let purchase = conn
            .query_row(
                &format!(
                    "SELECT {PURCHASE_COLUMNS} FROM purchases \
                     WHERE route_id = ?1 AND proof_token = ?2"
                ),
                params![route_id, proof_token],
                purchase_from_row,
            )
            .optional()?;
        Ok(purchase)
    }

    pub fn get_purchase(&self, id: i64) -> Result<Option<Purchase>, GatewayError> {
        let conn = self.lock()?;
        let purchase = conn
            .query_row(
                &format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1"),
                params![id],
                purchase_from_row,
            )
            .optional()?;
        Ok(purchase)
    }

    /// Redeem one credit. A single guarded UPDATE, so two callers can never
    /// both take the last credit. Returns false when exhausted.
    pub fn try_use_credit(&self, purchase_id: i64) -> Result<bool, GatewayError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            r#"
            UPDATE purchases SET credits_used = credits_used + 1
            WHERE id = ?1 AND credits_used < credits_available
            "#,
            params![purchase_id],
        )?;
        Ok(rows == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::url_route;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn setup() -> (Database, crate::db::Route) {
        let db = Database::new(":memory:").unwrap();
        let owner = db.create_owner(None, None).unwrap();
        let route = db.create_route(&url_route(owner.id)).unwrap();
        (db, route)
    }

    fn new_purchase<'a>(route: &'a crate::db::Route, token: &'a str) -> NewPurchase<'a> {
        NewPurchase {
            route_id: route.id,
            short_code: &route.short_code,
            price: route.price,
            policy: route.policy,
            credits_available: route.credits,
            paid_to: "0x4242424242424242424242424242424242424242",
            proof_token: token,
            payment_payload: r#"{"x402Version":1}"#,
            settle_response: r#"{"success":true}"#,
            network: "base-sepolia",
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_purchase_starts_with_one_credit_used() {
        let (db, route) = setup();
        let purchase = db.create_purchase(&new_purchase(&route, "tok-1")).unwrap();
        assert_eq!(purchase.credits_available, 3);
        assert_eq!(purchase.credits_used, 1);
        assert_eq!(purchase.credits_remaining(), 2);

        let found = db
            .find_purchase_by_route_and_proof(route.id, "tok-1")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, purchase.id);
        assert_eq!(found.settle_response, r#"{"success":true}"#);
    }

    #[test]
    fn test_proof_token_unique_per_route() {
        let (db, route) = setup();
        db.create_purchase(&new_purchase(&route, "tok-1")).unwrap();
        assert!(matches!(
            db.create_purchase(&new_purchase(&route, "tok-1")),
            Err(GatewayError::Duplicate(_))
        ));
    }

    #[test]
    fn test_lookup_is_scoped_to_route() {
        let (db, route) = setup();
        db.create_purchase(&new_purchase(&route, "tok-1")).unwrap();
        assert!(db
            .find_purchase_by_route_and_proof(route.id + 1, "tok-1")
            .unwrap()
            .is_none());
        assert!(db
            .find_purchase_by_route_and_proof(route.id, "tok-2")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_credits_exhaust() {
        let (db, route) = setup();
        let purchase = db.create_purchase(&new_purchase(&route, "tok-1")).unwrap();

        assert!(db.try_use_credit(purchase.id).unwrap());
        assert!(db.try_use_credit(purchase.id).unwrap());
        assert!(!db.try_use_credit(purchase.id).unwrap());
        assert!(!db.try_use_credit(purchase.id).unwrap());

        let stored = db.get_purchase(purchase.id).unwrap().unwrap();
        assert_eq!(stored.credits_used, 3);
        assert_eq!(stored.credits_available, 3);
    }

    #[test]
    fn test_concurrent_redemption_never_overspends() {
        let db = Database::new(":memory:").unwrap();
        let owner = db.create_owner(None, None).unwrap();
        let mut new_route = url_route(owner.id);
        new_route.credits = 6;
        let route = db.create_route(&new_route).unwrap();
        let purchase = db.create_purchase(&new_purchase(&route, "tok-1")).unwrap();

        let db = Arc::new(db);
        let wins = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let db = Arc::clone(&db);
                let wins = Arc::clone(&wins);
                std::thread::spawn(move || {
                    if db.try_use_credit(purchase.id).unwrap() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 6 available, 1 used at purchase time
        assert_eq!(wins.load(Ordering::SeqCst), 5);
        let stored = db.get_purchase(purchase.id).unwrap().unwrap();
        assert_eq!(stored.credits_used, 6);
    }
}
