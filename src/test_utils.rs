//! Shared test utilities: event builders, arbitrary generators for
//! property-based testing, local HTTP servers and in-process fakes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::accounting::{
    AccountingApi, AccountingError, AccountingErrorKind, Contact, Invoice, Organisation,
};
use crate::auth::{AuthError, CredentialLease, LEASE_FILE_NAME, TokenExchange, TokenResponse};
use crate::notify::{Notification, Notifier, NotifyError};
use crate::persistence::save_json_atomic;
use crate::types::{EventCategory, EventType, InvoiceId, ResourceId, TenantId, WebhookEvent};

/// Fixed reference time for event dates; whole seconds so dates survive a
/// round trip through the queue file unchanged.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

/// An invoice UPDATE event for `resource`, dated `offset_secs` after [`t0`].
pub fn invoice_event(resource: &str, offset_secs: i64) -> WebhookEvent {
    WebhookEvent {
        resource_id: ResourceId::new(resource),
        event_type: EventType::Update,
        event_category: EventCategory::Invoice,
        tenant_id: TenantId::new("tenant-1"),
        event_date_utc: t0() + Duration::seconds(offset_secs),
        resource_uri: format!("https://api.xero.com/api.xro/2.0/Invoices/{resource}"),
        tenant_type: Some("ORGANISATION".to_string()),
    }
}

pub fn arb_event() -> impl Strategy<Value = WebhookEvent> {
    (
        "[A-Za-z0-9-]{1,36}",
        prop::sample::select(vec!["CREATE", "UPDATE", "DELETE"]),
        prop::sample::select(vec!["INVOICE", "CONTACT"]),
        0i64..1_000_000,
    )
        .prop_map(|(resource, event_type, category, offset)| WebhookEvent {
            event_type: event_type.to_string().into(),
            event_category: category.to_string().into(),
            ..invoice_event(&resource, offset)
        })
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_http(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Writes a lease whose access token is `name` and refresh token is
/// `refresh-{name}` to `<dir>/token.json`.
pub fn write_lease(dir: &Path, name: &str, obtained_at: DateTime<Utc>, expires_in: i64) {
    let lease = CredentialLease {
        access_token: name.to_string(),
        refresh_token: format!("refresh-{name}"),
        expires_in,
        token_type: "Bearer".to_string(),
        obtained_at,
    };
    save_json_atomic(&dir.join(LEASE_FILE_NAME), &lease).unwrap();
}

// ─── Token exchange ───

#[derive(Debug, Default)]
struct ExchangeState {
    calls: u32,
    last_refresh_token: Option<String>,
}

/// Hands out `access-{n}` / `refresh-{n}` for the n-th refresh, or rejects
/// every refresh with a fixed status.
#[derive(Debug, Clone, Default)]
pub struct FakeTokenExchange {
    state: Arc<Mutex<ExchangeState>>,
    reject_status: Option<u16>,
    lifetime_secs: Option<i64>,
}

impl FakeTokenExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(status: u16) -> Self {
        FakeTokenExchange {
            reject_status: Some(status),
            ..Self::default()
        }
    }

    /// Issues tokens with the given `expires_in` instead of 1800 seconds.
    pub fn with_lifetime(secs: i64) -> Self {
        FakeTokenExchange {
            lifetime_secs: Some(secs),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.state.lock().unwrap().calls
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.state.lock().unwrap().last_refresh_token.clone()
    }
}

impl TokenExchange for FakeTokenExchange {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        // Yield so concurrent callers really do overlap.
        tokio::task::yield_now().await;

        let n = {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            state.last_refresh_token = Some(refresh_token.to_string());
            state.calls
        };

        if let Some(status) = self.reject_status {
            return Err(AuthError::RefreshRejected {
                status,
                body: "invalid_grant".to_string(),
            });
        }

        Ok(TokenResponse {
            access_token: format!("access-{n}"),
            refresh_token: format!("refresh-{n}"),
            expires_in: self.lifetime_secs.unwrap_or(1800),
            token_type: "Bearer".to_string(),
        })
    }
}

// ─── Accounting API ───

/// Builds an invoice with an optional contact address.
pub fn invoice(id: &str, sent_to_contact: bool, email: Option<&str>) -> Invoice {
    Invoice {
        invoice_id: InvoiceId::new(id),
        invoice_number: Some(id.to_string()),
        reference: None,
        status: "AUTHORISED".to_string(),
        sent_to_contact,
        contact: Some(Contact {
            name: Some("Acme Ltd".to_string()),
            email_address: email.map(str::to_string),
            contact_persons: Vec::new(),
        }),
        amount_due: Some(100.0),
        total: Some(100.0),
        currency_code: Some("NZD".to_string()),
    }
}

#[derive(Debug, Default)]
struct AccountingState {
    invoices: HashMap<InvoiceId, Invoice>,
    get_failures: Vec<AccountingError>,
    mark_failure: Option<AccountingError>,
    ancillary_fails: bool,
    get_calls: u32,
    marked: Vec<InvoiceId>,
}

/// In-memory accounting platform.
///
/// `mark_as_sent` flips the stored invoice's flag, so a later fetch sees it
/// as sent, the way the real platform behaves.
#[derive(Debug, Clone, Default)]
pub struct FakeAccountingApi {
    state: Arc<Mutex<AccountingState>>,
}

impl FakeAccountingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invoice(self, invoice: Invoice) -> Self {
        self.put_invoice(invoice);
        self
    }

    pub fn put_invoice(&self, invoice: Invoice) {
        let mut state = self.state.lock().unwrap();
        state.invoices.insert(invoice.invoice_id.clone(), invoice);
    }

    /// Makes the next `get_invoice` call fail with `err`.
    pub fn fail_next_get(&self, err: AccountingError) {
        self.state.lock().unwrap().get_failures.push(err);
    }

    pub fn fail_marks(&self, err: AccountingError) {
        self.state.lock().unwrap().mark_failure = Some(err);
    }

    /// Makes organisation, PDF and link lookups fail.
    pub fn fail_ancillary(&self) {
        self.state.lock().unwrap().ancillary_fails = true;
    }

    pub fn get_calls(&self) -> u32 {
        self.state.lock().unwrap().get_calls
    }

    pub fn marked(&self) -> Vec<InvoiceId> {
        self.state.lock().unwrap().marked.clone()
    }

    fn ancillary<T>(&self, value: T) -> Result<T, AccountingError> {
        if self.state.lock().unwrap().ancillary_fails {
            return Err(AccountingError::from_status(500, "ancillary lookup failed"));
        }
        Ok(value)
    }
}

impl AccountingApi for FakeAccountingApi {
    async fn get_invoice(
        &self,
        _tenant: &TenantId,
        id: &InvoiceId,
    ) -> Result<Invoice, AccountingError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        if !state.get_failures.is_empty() {
            return Err(state.get_failures.remove(0));
        }
        state.invoices.get(id).cloned().ok_or_else(|| {
            AccountingError::new(AccountingErrorKind::NotFound, Some(404), "no such invoice")
        })
    }

    async fn mark_as_sent(
        &self,
        _tenant: &TenantId,
        id: &InvoiceId,
    ) -> Result<(), AccountingError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.mark_failure.clone() {
            return Err(err);
        }
        state.marked.push(id.clone());
        if let Some(invoice) = state.invoices.get_mut(id) {
            invoice.sent_to_contact = true;
        }
        Ok(())
    }

    async fn get_organisation(&self, _tenant: &TenantId) -> Result<Organisation, AccountingError> {
        self.ancillary(Organisation {
            name: "Demo Co".to_string(),
            legal_name: None,
        })
    }

    async fn get_invoice_pdf(
        &self,
        _tenant: &TenantId,
        _id: &InvoiceId,
    ) -> Result<Bytes, AccountingError> {
        self.ancillary(Bytes::from_static(b"%PDF-1.4"))
    }

    async fn get_online_invoice_url(
        &self,
        _tenant: &TenantId,
        id: &InvoiceId,
    ) -> Result<String, AccountingError> {
        self.ancillary(format!("https://in.example/{id}"))
    }
}

// ─── Notifier ───

#[derive(Debug, Default)]
struct NotifierState {
    sent: Vec<Notification>,
    fail_next: Option<u16>,
}

/// Records every notification it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next send fail as if the relay answered `status`.
    pub fn fail_next(&self, status: u16) {
        self.state.lock().unwrap().fail_next = Some(status);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.fail_next.take() {
            return Err(NotifyError::Rejected {
                status,
                body: "relay unavailable".to_string(),
            });
        }
        state.sent.push(notification.clone());
        Ok(())
    }
}
