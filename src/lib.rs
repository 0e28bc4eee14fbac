//! teller-core: client-side transaction lifecycle tracker.
//!
//! One canonical component shared by the cashier console and the deposit and
//! withdrawal Mini Apps. The tracker subscribes to the backend's real-time
//! event channel, reconciles pushed events against the locally tracked
//! transaction, drives screen transitions through the [`ports::ScreenDriver`]
//! contract and recovers from disconnect/reconnect races. The backend owns
//! all business rules; this crate owns only the client-side state machine.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod ports;
pub mod recovery;
pub mod registry;
pub mod tracker;
pub mod validation;

use std::sync::Arc;

use url::Url;

use adapters::{EventSourceClient, HttpBackendApi};
use config::Config;
use ports::ScreenDriver;
use tracker::Tracker;

pub use domain::{Transaction, TransactionSnapshot, TxStatus};
pub use ports::{CreateRequest, Screen};

/// Top-level application object owning the tracker and its collaborators.
/// Everything is explicitly constructed and injected; there are no global
/// singletons to reach for.
pub struct App {
    pub tracker: Tracker,
    events: EventSourceClient,
}

impl App {
    pub fn new(config: &Config, screen: Arc<dyn ScreenDriver>) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.backend_url)?;
        let api = Arc::new(HttpBackendApi::new(base_url, config.variant));
        let tracker = Tracker::new(config.variant, api, screen);
        let events = EventSourceClient::new(
            config.events_url.clone(),
            config.reconnect_policy(),
            Some(config.poll_interval()),
        );

        Ok(Self { tracker, events })
    }

    /// Drives the event loop until the reconnect budget is exhausted; by then
    /// the user has been shown an actionable connectivity error.
    pub async fn run(&mut self) {
        let App { tracker, events } = self;
        events.run(tracker).await;
    }
}

/// Installs the tracing subscriber for embedding shells. `RUST_LOG` filters
/// as usual, defaulting to `info`.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
