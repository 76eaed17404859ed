//! Payment Gate.
//!
//! Decides whether a request to a resolved route may be dispatched:
//!
//! 1. A proof token that already paid for this route is looked up in the
//!    ledger. Credit purchases redeem one credit; subscriptions check their
//!    window. Neither calls the facilitator.
//! 2. Otherwise the proof is verified, then settled, then recorded. Settle
//!    only ever runs after a successful verify of the same proof, and the
//!    whole negotiation runs on a detached task so a dropped client cannot
//!    abandon a settlement half-way.
//! 3. Anything short of that is a 402 carrying the requirements.
//!
//! Route counters are bumped here and are best-effort: a failed increment is
//! logged and never changes the outcome.

use alloy::primitives::Address;
use paylink::{
    build_requirements, Facilitator, PaymentProof, PaymentRequirements, ProtocolVersion,
    RequirementsInput, SettleResponse,
};
use std::sync::Arc;

use crate::db::{Database, PolicyType, Route};
use crate::error::GatewayError;
use crate::ledger::{NewPurchase, Purchase};
use crate::metrics::{FACILITATOR_FAILURES, GATE_OUTCOMES, UNRECORDED_PAYMENTS};

/// Unix-seconds time source, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Payee when the route owner has no address of their own
    pub default_pay_to: Address,
    pub max_timeout_seconds: u64,
    pub subscription_period_secs: i64,
}

/// Proof that a request may be dispatched. Only the gate constructs these,
/// so the dispatcher cannot run without a reused credit, an active
/// subscription or a freshly recorded payment.
#[derive(Debug, Clone)]
pub enum Authorization {
    CreditReused {
        purchase: Purchase,
    },
    SubscriptionActive {
        purchase: Purchase,
    },
    Paid {
        purchase: Purchase,
        settlement: SettleResponse,
    },
}

impl Authorization {
    pub fn purchase(&self) -> &Purchase {
        match self {
            Authorization::CreditReused { purchase }
            | Authorization::SubscriptionActive { purchase }
            | Authorization::Paid { purchase, .. } => purchase,
        }
    }

    /// Settlement receipt, present only when this request paid.
    pub fn settlement(&self) -> Option<&SettleResponse> {
        match self {
            Authorization::Paid { settlement, .. } => Some(settlement),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Authorization::CreditReused { .. } => "credit_reused",
            Authorization::SubscriptionActive { .. } => "subscription_active",
            Authorization::Paid { .. } => "paid",
        }
    }
}

#[derive(Debug)]
pub enum GateOutcome {
    Authorized(Authorization),
    PaymentRequired {
        requirements: PaymentRequirements,
        version: ProtocolVersion,
        reason: String,
    },
}

/// One request as seen by the gate.
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub route: Route,
    /// Owner's payment address, if any
    pub owner_pay_to: Option<Address>,
    /// Fully-qualified URL of the resource
    pub resource_url: String,
    /// Raw value of the version's proof header
    pub proof_token: Option<String>,
}

/// Result of looking a proof token up in the ledger.
enum Existing {
    Authorized(Authorization),
    /// The token already paid but can no longer authorize
    Spent(String),
    None,
}

pub struct PaymentGate<F> {
    db: Arc<Database>,
    facilitator: Arc<F>,
    clock: Arc<dyn Clock>,
    settings: GateSettings,
}

impl<F> Clone for PaymentGate<F> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            facilitator: Arc::clone(&self.facilitator),
            clock: Arc::clone(&self.clock),
            settings: self.settings.clone(),
        }
    }
}

impl<F: Facilitator + 'static> PaymentGate<F> {
    pub fn new(db: Arc<Database>, facilitator: Arc<F>, settings: GateSettings) -> Self {
        Self {
            db,
            facilitator,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Requirements the route charges under. Deterministic for a given
    /// route, payee and URL.
    pub fn requirements_for(
        &self,
        route: &Route,
        owner_pay_to: Option<Address>,
        resource_url: &str,
    ) -> Result<PaymentRequirements, GatewayError> {
        let description = route
            .description
            .clone()
            .or_else(|| route.title.clone())
            .unwrap_or_else(|| format!("Payment for {} {}", route.method, resource_url));

        Ok(build_requirements(&RequirementsInput {
            version: route.version()?,
            price: route.price,
            network: route.network,
            pay_to: owner_pay_to.unwrap_or(self.settings.default_pay_to),
            resource: resource_url.to_string(),
            description: Some(description),
            max_timeout_seconds: self.settings.max_timeout_seconds,
        }))
    }

    pub async fn authorize(&self, request: GateRequest) -> Result<GateOutcome, GatewayError> {
        let route_id = request.route.id;
        let short_code = request.route.short_code.clone();
        let outcome = self.decide(request).await?;

        match &outcome {
            GateOutcome::Authorized(auth) => {
                GATE_OUTCOMES.with_label_values(&[auth.label()]).inc();
                tracing::info!(
                    %short_code,
                    purchase_id = auth.purchase().id,
                    outcome = auth.label(),
                    "request authorized"
                );
                if let Err(e) = self.db.increment_access_count(route_id) {
                    tracing::warn!(%short_code, error = %e, "failed to increment access count");
                }
            }
            GateOutcome::PaymentRequired { reason, .. } => {
                GATE_OUTCOMES.with_label_values(&["payment_required"]).inc();
                tracing::debug!(%short_code, %reason, "payment required");
                if let Err(e) = self.db.increment_attempt_count(route_id) {
                    tracing::warn!(%short_code, error = %e, "failed to increment attempt count");
                }
            }
        }

        Ok(outcome)
    }

    async fn decide(&self, request: GateRequest) -> Result<GateOutcome, GatewayError> {
        let GateRequest {
            route,
            owner_pay_to,
            resource_url,
            proof_token,
        } = request;

        let version = route.version()?;
        let requirements = self.requirements_for(&route, owner_pay_to, &resource_url)?;
        let required = |requirements: PaymentRequirements, reason: String| {
            Ok(GateOutcome::PaymentRequired {
                requirements,
                version,
                reason,
            })
        };

        let token = match proof_token.map(|t| t.trim().to_string()) {
            Some(t) if !t.is_empty() => t,
            _ => {
                return required(
                    requirements,
                    format!("{} header is required", version.payment_header()),
                )
            }
        };

        match self.check_existing(&route, &token) {
            Existing::Authorized(auth) => return Ok(GateOutcome::Authorized(auth)),
            Existing::Spent(reason) => return required(requirements, reason),
            Existing::None => {}
        }

        let gate = self.clone();
        let handle = actix_web::rt::spawn(async move {
            gate.negotiate(route, version, requirements, token).await
        });
        handle
            .await
            .map_err(|e| GatewayError::Internal(format!("payment task failed: {e}")))?
    }

    /// Ledger lookup for a token that may already have paid. Lookup errors
    /// fall through to a fresh payment attempt.
    fn check_existing(&self, route: &Route, token: &str) -> Existing {
        let purchase = match self.db.find_purchase_by_route_and_proof(route.id, token) {
            Ok(Some(p)) => p,
            Ok(None) => return Existing::None,
            Err(e) => {
                tracing::warn!(
                    short_code = %route.short_code,
                    error = %e,
                    "purchase lookup failed, treating as new payment"
                );
                return Existing::None;
            }
        };

        match purchase.policy {
            PolicyType::Credit => match self.db.try_use_credit(purchase.id) {
                Ok(true) => {
                    let mut purchase = purchase;
                    purchase.credits_used += 1;
                    Existing::Authorized(Authorization::CreditReused { purchase })
                }
                Ok(false) => Existing::Spent("payment credits exhausted".to_string()),
                Err(e) => {
                    tracing::warn!(
                        purchase_id = purchase.id,
                        error = %e,
                        "credit redemption failed, treating as new payment"
                    );
                    Existing::None
                }
            },
            PolicyType::Subscription => {
                let expires_at = purchase.expires_at(self.settings.subscription_period_secs);
                if self.clock.now() < expires_at {
                    Existing::Authorized(Authorization::SubscriptionActive { purchase })
                } else {
                    Existing::Spent("subscription expired".to_string())
                }
            }
        }
    }

    /// Verify, settle, record. Runs detached from the request.
    async fn negotiate(
        self,
        route: Route,
        version: ProtocolVersion,
        requirements: PaymentRequirements,
        token: String,
    ) -> Result<GateOutcome, GatewayError> {
        let required = |requirements: PaymentRequirements, reason: String| {
            Ok(GateOutcome::PaymentRequired {
                requirements,
                version,
                reason,
            })
        };

        let proof = match PaymentProof::decode(&token, version) {
            Ok(proof) => proof,
            Err(e) => return required(requirements, e.to_string()),
        };
        let request = version.facilitator_request(&proof, &requirements);

        let verified = match self.facilitator.verify(&request).await {
            Ok(v) => v,
            Err(e) => {
                FACILITATOR_FAILURES.with_label_values(&["verify"]).inc();
                tracing::warn!(short_code = %route.short_code, error = %e, "verify failed");
                return required(requirements, format!("payment verification failed: {e}"));
            }
        };
        if !verified.is_valid {
            FACILITATOR_FAILURES.with_label_values(&["verify"]).inc();
            let reason = verified
                .invalid_reason
                .unwrap_or_else(|| "payment verification failed".to_string());
            return required(requirements, reason);
        }

        let settlement = match self.facilitator.settle(&request).await {
            Ok(s) => s,
            Err(e) => {
                FACILITATOR_FAILURES.with_label_values(&["settle"]).inc();
                tracing::warn!(short_code = %route.short_code, error = %e, "settle failed");
                return required(requirements, format!("payment settlement failed: {e}"));
            }
        };
        if !settlement.success {
            FACILITATOR_FAILURES.with_label_values(&["settle"]).inc();
            let reason = settlement
                .error_reason
                .clone()
                .unwrap_or_else(|| "payment settlement failed".to_string());
            return required(requirements, reason);
        }

        match self.record(&route, &requirements, &proof, &settlement) {
            Ok(purchase) => {
                if let Err(e) = self.db.increment_payment_count(route.id) {
                    tracing::warn!(
                        short_code = %route.short_code,
                        error = %e,
                        "failed to increment payment count"
                    );
                }
                Ok(GateOutcome::Authorized(Authorization::Paid {
                    purchase,
                    settlement,
                }))
            }
            // A concurrent request recorded this token first.
            Err(GatewayError::Duplicate(_)) => match self.check_existing(&route, &token) {
                Existing::Authorized(auth) => Ok(GateOutcome::Authorized(auth)),
                Existing::Spent(reason) => required(requirements, reason),
                Existing::None => Err(GatewayError::Internal(
                    "purchase vanished after duplicate insert".to_string(),
                )),
            },
            Err(e) => {
                UNRECORDED_PAYMENTS.inc();
                tracing::error!(
                    critical = true,
                    short_code = %route.short_code,
                    route_id = route.id,
                    transaction = settlement.transaction.as_deref().unwrap_or(""),
                    payer = settlement.payer.as_deref().unwrap_or(""),
                    error = %e,
                    "payment settled but purchase was not recorded"
                );
                Err(GatewayError::UnrecordedPayment(format!(
                    "route {} transaction {}: {e}",
                    route.short_code,
                    settlement.transaction.as_deref().unwrap_or("unknown")
                )))
            }
        }
    }

    fn record(
        &self,
        route: &Route,
        requirements: &PaymentRequirements,
        proof: &PaymentProof,
        settlement: &SettleResponse,
    ) -> Result<Purchase, GatewayError> {
        let payload = serde_json::to_string(&proof.payload)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let receipt = serde_json::to_string(settlement)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let paid_to = requirements.pay_to.to_checksum(None);

        self.db.create_purchase(&NewPurchase {
            route_id: route.id,
            short_code: &route.short_code,
            price: route.price,
            policy: route.policy,
            credits_available: route.credits,
            paid_to: &paid_to,
            proof_token: &proof.token,
            payment_payload: &payload,
            settle_response: &receipt,
            network: &requirements.network,
            created_at: self.clock.now(),
        })
    }
}
