//! HTTP implementation of the backend API boundary.

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

use async_trait::async_trait;

use crate::config::Variant;
use crate::ports::{ApiError, BackendApi, CreateAck, CreateRequest, StatusSnapshot};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// REST client for the transactional backend. Requests run behind a circuit
/// breaker so a struggling backend is not hammered by every screen refresh.
#[derive(Clone)]
pub struct HttpBackendApi {
    client: Client,
    base_url: Url,
    variant: Variant,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpBackendApi {
    pub fn new(base_url: Url, variant: Variant) -> Self {
        Self::with_circuit_breaker(base_url, variant, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: Url,
        variant: Variant,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            base_url,
            variant,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: std::future::Future<Output = Result<T, ApiError>>,
    {
        match self.circuit_breaker.call(call).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(ApiError::Unavailable(
                "backend circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(err)) => Err(err),
        }
    }
}

/// Pulls the backend's error message out of a non-success response body.
async fn rejection_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("backend returned {}", status)),
        Err(_) => format!("backend returned {}", status),
    }
}

#[async_trait]
impl BackendApi for HttpBackendApi {
    async fn create_transaction(&self, request: &CreateRequest) -> Result<CreateAck, ApiError> {
        let url = self.endpoint("transactions");
        let client = self.client.clone();
        let body = json!({
            "kind": self.variant.as_str(),
            "amount": request.amount,
            "details": request.details,
        });
        let idempotency_key = request.idempotency_key.clone();

        self.guarded(async move {
            let response = client
                .post(&url)
                .header("Idempotency-Key", idempotency_key)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ApiError::Rejected(rejection_message(response).await));
            }

            let ack = response.json::<CreateAck>().await?;
            Ok(ack)
        })
        .await
    }

    async fn fetch_status(&self, id: &str) -> Result<StatusSnapshot, ApiError> {
        let url = self.endpoint(&format!("transactions/{}", id));
        let client = self.client.clone();

        self.guarded(async move {
            let response = client.get(&url).send().await?;

            if response.status() == 404 {
                return Err(ApiError::NotFound);
            }
            if !response.status().is_success() {
                return Err(ApiError::Rejected(rejection_message(response).await));
            }

            let snapshot = response.json::<StatusSnapshot>().await?;
            Ok(snapshot)
        })
        .await
    }

    async fn cancel(&self, id: &str, reason: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("transactions/{}/cancel", id));
        let client = self.client.clone();
        let body = json!({ "reason": reason });

        self.guarded(async move {
            let response = client.post(&url).json(&body).send().await?;

            if response.status() == 404 {
                return Err(ApiError::NotFound);
            }
            if !response.status().is_success() {
                return Err(ApiError::Rejected(rejection_message(response).await));
            }

            Ok(())
        })
        .await
    }
}
