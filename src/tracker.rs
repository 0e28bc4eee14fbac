//! Transaction lifecycle tracker.
//!
//! Single-threaded and event-driven: everything happens in reaction to push
//! events from the event source or to user actions funneled through the
//! Screen Driver's callbacks. Network calls may resolve concurrently with new
//! push events for the same transaction; the forward-only, idempotent
//! transition rules make that safe without locks, and a slow response that
//! lands after the user has moved on is discarded by checking the
//! still-current transaction id before applying it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Variant;
use crate::domain::{Transaction, TxStatus};
use crate::error::TrackerError;
use crate::lifecycle::{self, Decision};
use crate::ports::{ApiError, BackendApi, CreateRequest, Screen, ScreenDriver};
use crate::recovery::{self, FetchAction};
use crate::registry::Registry;
use crate::validation::{self, REASON_MAX_LEN};

const TIMEOUT_FALLBACK_NOTE: &str = "The transaction was cancelled due to inactivity.";
const UNCONFIRMED_NOTE: &str = "The request was not confirmed. Please try again.";

pub struct Tracker {
    variant: Variant,
    registry: Registry,
    api: Arc<dyn BackendApi>,
    screen: Arc<dyn ScreenDriver>,
    connected: bool,
}

impl Tracker {
    pub fn new(variant: Variant, api: Arc<dyn BackendApi>, screen: Arc<dyn ScreenDriver>) -> Self {
        Self {
            variant,
            registry: Registry::new(),
            api,
            screen,
            connected: false,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn active_transaction(&self) -> Option<&Transaction> {
        self.registry.active()
    }

    // ---- user actions -----------------------------------------------------

    /// Creates a transaction optimistically: the provisional placeholder is
    /// tracked and rendered before the backend acknowledges, then promoted
    /// once an id is assigned.
    pub async fn submit(&mut self, request: CreateRequest) -> Result<(), TrackerError> {
        validation::validate_create(&request)?;

        if self.registry.active().is_some() {
            return Err(TrackerError::AlreadyActive);
        }

        info!(variant = %self.variant, amount = request.amount, "submitting transaction");
        self.registry
            .set_active(Transaction::provisional(request.amount, request.details.clone()));
        self.render_active(Screen::Waiting, None);

        match self.api.create_transaction(&request).await {
            Ok(ack) => {
                let still_provisional = self
                    .registry
                    .active()
                    .map(|tx| tx.id.is_none())
                    .unwrap_or(false);
                if still_provisional {
                    self.promote(&ack.id, None, ack.status);
                } else {
                    // User cancelled (or an event promoted us) while the
                    // request was in flight; the ack is stale.
                    debug!(id = %ack.id, "discarding stale creation ack");
                }
                Ok(())
            }
            Err(ApiError::Rejected(message)) => {
                warn!("create rejected by backend: {}", message);
                self.registry.clear_active();
                self.screen.render(Screen::Failure, None, Some(&message));
                Err(TrackerError::Rejected(message))
            }
            Err(err) => {
                warn!("create failed: {}", err);
                self.registry.clear_active();
                let message = err.to_string();
                self.screen.render(Screen::Failure, None, Some(&message));
                Err(err.into())
            }
        }
    }

    /// Explicit user cancellation. Cooperative only; an in-flight create is
    /// never aborted, its late ack is simply discarded.
    pub async fn cancel(&mut self, reason: &str) -> Result<(), TrackerError> {
        let reason = validation::sanitize_string(reason);
        validation::validate_max_len("reason", &reason, REASON_MAX_LEN)?;

        let Some(tx) = self.registry.active() else {
            debug!("cancel with no active transaction");
            return Ok(());
        };

        match tx.id.clone() {
            None => {
                // Never acknowledged; nothing to tell the backend.
                self.registry.clear_active();
                self.screen.render(Screen::Main, None, Some("cancelled"));
                Ok(())
            }
            Some(id) => match self.api.cancel(&id, &reason).await {
                Ok(()) => {
                    if self.current_id_is(&id) {
                        self.registry.retire(id, TxStatus::Cancelled);
                        self.screen.render(Screen::Main, None, Some("cancelled"));
                    }
                    Ok(())
                }
                Err(err @ (ApiError::Rejected(_) | ApiError::NotFound)) => {
                    // Raced a transition; fetch the authoritative truth.
                    warn!(id = %id, "cancel declined ({}), reconciling", err);
                    self.refresh_status().await;
                    Ok(())
                }
                Err(err) => {
                    warn!(id = %id, "cancel failed: {}", err);
                    let message = err.to_string();
                    self.render_active(Screen::Failure, Some(&message));
                    Err(err.into())
                }
            },
        }
    }

    /// Application regained foreground focus.
    pub async fn resume(&mut self) {
        debug!("application resumed");
        self.refresh_status().await;
    }

    /// User asked to retry after an error screen.
    pub async fn retry(&mut self) {
        if self.registry.active().is_some() {
            self.refresh_status().await;
        } else {
            self.screen.render(Screen::Main, None, None);
        }
    }

    // ---- event intake -----------------------------------------------------

    pub async fn on_connect(&mut self) {
        self.connected = true;
        info!(variant = %self.variant, "event source connected");
        // Reconcile before trusting further push events.
        if self.registry.active().is_some() {
            self.refresh_status().await;
        }
    }

    pub fn on_disconnect(&mut self, reason: &str) {
        self.connected = false;
        warn!("event source disconnected: {}", reason);
    }

    pub fn on_auth_result(&mut self, success: bool, context: &str) {
        if success {
            debug!("event source authenticated");
        } else {
            warn!("event source authentication failed: {}", context);
            self.screen.render(Screen::Failure, None, Some(context));
        }
    }

    pub fn on_transaction_created(&mut self, id: &str, amount: i64, status: TxStatus) {
        if self.registry.retired_status(id).is_some() {
            debug!(id = %id, "creation ack for finished transaction, ignoring");
            return;
        }

        enum AckRoute {
            Promote,
            Duplicate,
            Foreign(Option<String>),
            Adopt,
        }

        let route = match self.registry.active() {
            Some(tx) if tx.id.is_none() => AckRoute::Promote,
            Some(tx) if tx.id.as_deref() == Some(id) => AckRoute::Duplicate,
            Some(tx) => AckRoute::Foreign(tx.id.clone()),
            None => AckRoute::Adopt,
        };

        match route {
            AckRoute::Promote => self.promote(id, Some(amount), status),
            AckRoute::Duplicate => {
                // HTTP ack and push ack both arrived; idempotent.
                self.apply_transition(id, status, serde_json::Value::Null, "created-ack");
            }
            AckRoute::Foreign(active) => {
                warn!(id = %id, ?active, "creation ack for foreign transaction, ignoring");
            }
            AckRoute::Adopt => {
                // Ack for a transaction this session no longer holds (e.g.
                // after a reload); adopt it rather than lose it.
                info!(id = %id, "adopting acknowledged transaction");
                let tx = Transaction::from_event(id, status, serde_json::json!({ "amount": amount }));
                self.registry.set_active(tx);
                self.commit_active();
            }
        }
    }

    pub fn on_transaction_transition(&mut self, id: &str, status: TxStatus, payload: serde_json::Value) {
        self.apply_transition(id, status, payload, "push");
    }

    /// Server-driven inactivity timeout; treated as cancelled-by-timeout.
    pub fn on_timeout(&mut self, id: &str, message: &str) {
        if self.registry.retired_status(id).is_some() {
            debug!(id = %id, "timeout for finished transaction, ignoring");
            return;
        }

        let ours = match self.registry.active() {
            Some(tx) => tx.id.as_deref() == Some(id) || tx.id.is_none(),
            None => false,
        };
        if !ours {
            debug!(id = %id, "timeout for foreign transaction, ignoring");
            return;
        }

        warn!(id = %id, "transaction timed out: {}", message);
        let note = validation::sanitize_string(message);
        let note = if note.is_empty() {
            TIMEOUT_FALLBACK_NOTE.to_string()
        } else {
            note
        };
        self.registry.retire(id.to_string(), TxStatus::Cancelled);
        self.screen.render(Screen::Main, None, Some(&note));
    }

    pub fn on_error(&mut self, error: &str) {
        // Diagnostics only; the user sees connectivity problems when the
        // reconnect budget is exhausted, not per transient error.
        warn!("event source error: {}", error);
    }

    /// Reconnect budget exhausted; the user must get an actionable error, not
    /// a stuck spinner.
    pub fn on_reconnect_exhausted(&mut self, reason: &str) {
        self.connected = false;
        warn!("reconnect attempts exhausted: {}", reason);
        let snapshot = self.registry.active().map(|tx| tx.snapshot());
        self.screen
            .render(Screen::ConnectionLost, snapshot.as_ref(), Some(reason));
    }

    // ---- reconciliation ---------------------------------------------------

    /// Single status-refresh operation behind both the polling fallback and
    /// the post-reconnect reconciliation; results feed the same state-machine
    /// entry point as live push events.
    pub async fn refresh_status(&mut self) {
        let maybe_id = match self.registry.active() {
            Some(tx) => tx.id.clone(),
            None => return,
        };

        let Some(id) = maybe_id else {
            // Provisional with no id: the creation ack is unrecoverable, and
            // that is an expected race, not an error.
            info!("clearing unconfirmed provisional transaction");
            self.registry.clear_active();
            self.screen.render(Screen::Main, None, Some(UNCONFIRMED_NOTE));
            return;
        };

        match self.api.fetch_status(&id).await {
            Ok(snapshot) => {
                if !self.current_id_is(&id) {
                    debug!(id = %id, "discarding stale status fetch");
                    return;
                }
                let local = match self.registry.active() {
                    Some(tx) => tx.status,
                    None => return,
                };
                match recovery::fetched_status_action(local, snapshot.status) {
                    FetchAction::Apply => {
                        info!(id = %id, status = %snapshot.status, "adopting fetched status");
                        self.apply_transition(&id, snapshot.status, snapshot.payload, "reconcile");
                    }
                    FetchAction::KeepLocal => {
                        debug!(id = %id, local = %local, fetched = %snapshot.status, "fetched status not forward, keeping local");
                    }
                }
            }
            Err(ApiError::NotFound) => {
                if !self.current_id_is(&id) {
                    return;
                }
                info!(id = %id, "transaction unknown to backend, clearing");
                self.registry.clear_active();
                self.screen.render(Screen::Main, None, None);
            }
            Err(err) => {
                // Transient; the next reconnect or poll tick retries.
                warn!(id = %id, "status fetch failed: {}", err);
            }
        }
    }

    // ---- internals --------------------------------------------------------

    fn apply_transition(&mut self, id: &str, status: TxStatus, payload: serde_json::Value, source: &str) {
        let retired = self.registry.retired_status(id);
        match lifecycle::classify(self.registry.active(), retired, id, status) {
            Decision::Promote => {
                if let Some(tx) = self.registry.active_mut() {
                    debug!(id = %id, status = %status, source, "promoting provisional transaction");
                    tx.id = Some(id.to_string());
                    tx.status = status;
                    tx.absorb_payload(payload);
                    self.commit_active();
                }
            }
            Decision::Advance => {
                if let Some(tx) = self.registry.active_mut() {
                    debug!(id = %id, status = %status, source, "applying transition");
                    tx.status = status;
                    tx.absorb_payload(payload);
                    self.commit_active();
                }
            }
            Decision::Synthesize => {
                // Terminal signal for an untracked id is authoritative; the
                // missing intermediate state is synthesized from its payload.
                info!(id = %id, status = %status, source, "synthesizing transaction from terminal event");
                let tx = Transaction::from_event(id, status, payload);
                let snapshot = tx.snapshot();
                self.screen
                    .render(lifecycle::screen_for(status), Some(&snapshot), None);
                self.registry.retire(id.to_string(), status);
            }
            Decision::Ignore(reason) => {
                debug!(id = %id, status = %status, source, ?reason, "ignoring event");
            }
        }
    }

    /// Promotes the provisional transaction once the backend assigns an id.
    fn promote(&mut self, id: &str, amount: Option<i64>, status: TxStatus) {
        let Some(tx) = self.registry.active_mut() else {
            return;
        };

        tx.id = Some(id.to_string());
        if let Some(amount) = amount {
            tx.amount = amount;
        }
        if status.is_forward_of(&tx.status) {
            tx.status = status;
        }
        let applied = tx.status;
        info!(id = %id, status = %applied, "transaction acknowledged");
        self.commit_active();
    }

    /// Renders the active transaction on the screen its status maps to, then
    /// retires it if that status is terminal. The registry is cleared only
    /// after the terminal render so the shell sees the final snapshot.
    fn commit_active(&mut self) {
        let Some(tx) = self.registry.active() else {
            return;
        };
        let snapshot = tx.snapshot();
        let status = tx.status;
        let id = tx.id.clone();

        self.screen
            .render(lifecycle::screen_for(status), Some(&snapshot), None);

        if status.is_terminal() {
            match id {
                Some(id) => self.registry.retire(id, status),
                None => self.registry.clear_active(),
            }
        }
    }

    fn render_active(&self, screen: Screen, note: Option<&str>) {
        let snapshot = self.registry.active().map(|tx| tx.snapshot());
        self.screen.render(screen, snapshot.as_ref(), note);
    }

    fn current_id_is(&self, id: &str) -> bool {
        self.registry
            .active()
            .and_then(|tx| tx.id.as_deref())
            .map(|active_id| active_id == id)
            .unwrap_or(false)
    }
}
