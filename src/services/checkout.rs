use crate::database::store::CheckoutStore;
use crate::database::transaction_repository::NewTransaction;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PixProvider;
use crate::payments::types::{digits_only, Customer, PixStatus, MIN_AMOUNT_CENTS};
use crate::workers::status_poller::{PollHandle, PollOutcome, PollerConfig, StatusPoller};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Checkout session lifecycle. `Creating` covers key fetch, billing
/// creation and the best-effort persistence write; `AwaitingPayment` means
/// a poller is (or was) watching the billing. Terminal transitions to
/// `Paid`/`Failed` are driven exclusively by the poller's outcome.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    Creating,
    AwaitingPayment,
    Paid,
    Failed,
}

/// The transaction the UI renders for the active session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActiveTransaction {
    pub billing_id: String,
    pub pix_code: String,
    pub pix_url: Option<String>,
    pub amount: i64,
    pub status: PixStatus,
}

/// Render-ready view of the session: state, transaction, last error.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckoutSnapshot {
    pub state: CheckoutState,
    pub transaction: Option<ActiveTransaction>,
    pub error: Option<String>,
}

#[derive(Debug)]
struct Session {
    state: CheckoutState,
    transaction: Option<ActiveTransaction>,
    error: Option<String>,
    /// Bumped by every accepted submit and every cancel. A poll outcome
    /// carries the epoch it was started under and is dropped if the
    /// session has moved on since.
    epoch: u64,
}

impl Session {
    fn idle() -> Self {
        Self {
            state: CheckoutState::Idle,
            transaction: None,
            error: None,
            epoch: 0,
        }
    }

    fn reset(&mut self) {
        self.state = CheckoutState::Idle;
        self.transaction = None;
        self.error = None;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Orchestrates one checkout at a time: key fetch, billing creation,
/// history write, poller lifecycle. Provider and store come in as trait
/// objects so callers and tests control the collaborators.
pub struct CheckoutService {
    provider: Arc<dyn PixProvider>,
    store: Arc<dyn CheckoutStore>,
    poller_config: PollerConfig,
    session: Arc<Mutex<Session>>,
    poll_handle: Mutex<Option<PollHandle>>,
}

impl CheckoutService {
    pub fn new(
        provider: Arc<dyn PixProvider>,
        store: Arc<dyn CheckoutStore>,
        poller_config: PollerConfig,
    ) -> Self {
        Self {
            provider,
            store,
            poller_config,
            session: Arc::new(Mutex::new(Session::idle())),
            poll_handle: Mutex::new(None),
        }
    }

    /// Run the submit flow. On success the session is `AwaitingPayment`
    /// with an active poller; every failure path lands back in `Idle`
    /// with a display-ready message in the snapshot.
    pub async fn submit(
        &self,
        customer: Customer,
        amount_cents: i64,
    ) -> PaymentResult<ActiveTransaction> {
        let epoch = {
            let mut session = self.session.lock().unwrap();

            // One in-flight transaction per service instance, enforced
            // here rather than trusted to the caller. A rejected
            // duplicate leaves the active session untouched so the
            // snapshot keeps rendering the checkout actually running.
            if matches!(
                session.state,
                CheckoutState::Creating | CheckoutState::AwaitingPayment
            ) {
                return Err(PaymentError::ValidationError {
                    message: "a checkout is already in progress".to_string(),
                    field: None,
                });
            }

            // Local validation happens before any network call. The
            // message lands in the snapshot like every other rejection.
            if amount_cents < MIN_AMOUNT_CENTS {
                let err = PaymentError::ValidationError {
                    message: format!(
                        "minimum charge is {} cents, got {}",
                        MIN_AMOUNT_CENTS, amount_cents
                    ),
                    field: Some("amount".to_string()),
                };
                session.error = Some(err.user_message());
                return Err(err);
            }
            if let Err(err) = customer.validate() {
                session.error = Some(err.user_message());
                return Err(err);
            }

            session.state = CheckoutState::Creating;
            session.transaction = None;
            session.error = None;
            session.epoch = session.epoch.wrapping_add(1);
            session.epoch
        };

        let api_key = match self.store.get_provider_key().await {
            Some(key) => key,
            None => {
                let err = PaymentError::ConfigurationError {
                    message: "no provider API key configured".to_string(),
                };
                self.fail_to_idle(&err);
                return Err(err);
            }
        };

        let billing = match self
            .provider
            .create_billing(&api_key, &customer, amount_cents)
            .await
        {
            Ok(billing) => billing,
            Err(err) => {
                self.fail_to_idle(&err);
                return Err(err);
            }
        };

        // History record; the checkout proceeds whether or not it lands.
        let record = NewTransaction {
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            customer_cpf: digits_only(&customer.tax_id),
            abacate_billing_id: billing.id.clone(),
            pix_code: billing.br_code.clone(),
            pix_url: billing.url.clone(),
            amount: billing.amount,
            status: PixStatus::Pending.as_str().to_string(),
        };
        self.store.save_transaction(&record).await;

        let transaction = ActiveTransaction {
            billing_id: billing.id.clone(),
            pix_code: billing.br_code,
            pix_url: billing.url,
            amount: billing.amount,
            status: PixStatus::Pending,
        };

        self.start_polling(api_key, billing.id, epoch);

        {
            let mut session = self.session.lock().unwrap();
            // A cancel during Creating bumps the epoch; don't overwrite
            // the reset it performed.
            if session.epoch == epoch {
                session.state = CheckoutState::AwaitingPayment;
                session.transaction = Some(transaction.clone());
            }
        }
        info!(
            billing_id = %transaction.billing_id,
            amount = transaction.amount,
            "checkout awaiting payment"
        );

        Ok(transaction)
    }

    /// Cancel any active polling and reset to `Idle`. Safe to call from
    /// any state, repeatedly.
    pub fn cancel(&self) {
        if let Some(handle) = self.poll_handle.lock().unwrap().take() {
            handle.cancel();
        }
        self.session.lock().unwrap().reset();
        info!("checkout reset to idle");
    }

    pub fn snapshot(&self) -> CheckoutSnapshot {
        let session = self.session.lock().unwrap();
        CheckoutSnapshot {
            state: session.state,
            transaction: session.transaction.clone(),
            error: session.error.clone(),
        }
    }

    fn fail_to_idle(&self, err: &PaymentError) {
        warn!(error = %err, "checkout submit failed");
        let mut session = self.session.lock().unwrap();
        session.state = CheckoutState::Idle;
        session.transaction = None;
        session.error = Some(err.user_message());
    }

    /// Start the poller for `billing_id`, first cancelling any loop left
    /// over from a previous submission so two timers never run at once,
    /// and wire its terminal outcome back into the session.
    fn start_polling(&self, api_key: String, billing_id: String, epoch: u64) {
        if let Some(previous) = self.poll_handle.lock().unwrap().take() {
            previous.cancel();
        }

        let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
        let handle = StatusPoller::spawn(
            self.poller_config.clone(),
            self.provider.clone(),
            self.store.clone(),
            api_key,
            billing_id,
            outcome_tx,
        );
        *self.poll_handle.lock().unwrap() = Some(handle);

        let session = self.session.clone();
        tokio::spawn(async move {
            // None means the poller stopped without a terminal status
            // (cancelled, or attempt cap reached): the session is left
            // as-is, awaiting payment until the user cancels.
            let Some(outcome) = outcome_rx.recv().await else {
                return;
            };

            let mut session = session.lock().unwrap();
            // A cancel or newer submit bumps the epoch; an outcome from
            // a superseded poll must not touch a session it no longer
            // owns.
            if session.epoch != epoch {
                return;
            }
            match outcome {
                PollOutcome::Paid => {
                    session.state = CheckoutState::Paid;
                    if let Some(tx) = session.transaction.as_mut() {
                        tx.status = PixStatus::Paid;
                    }
                }
                PollOutcome::Failed(status) => {
                    session.state = CheckoutState::Failed;
                    if let Some(tx) = session.transaction.as_mut() {
                        tx.status = status;
                    }
                    session.error = Some(match status {
                        PixStatus::Cancelled => "Payment was canceled.".to_string(),
                        _ => "Payment failed.".to_string(),
                    });
                }
            }
        });
    }
}
