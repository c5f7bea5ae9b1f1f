//! `reqwest` client for the accounting REST API, scoped to one credential.
//!
//! Every request carries a bearer token from the [`CredentialLeaseManager`]
//! and the tenant header. Document downloads go through a per-invoice
//! single-flight group and the fixed-delay attempt loop.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

use super::AccountingApi;
use super::attempt::{AttemptConfig, with_attempts};
use super::error::{AccountingError, Result};
use super::model::{
    Invoice, InvoicesEnvelope, OnlineInvoicesEnvelope, Organisation, OrganisationsEnvelope,
};
use super::single_flight::SingleFlight;
use crate::auth::{CredentialLeaseManager, HttpTokenExchange, TokenExchange};
use crate::types::{InvoiceId, TenantId};

/// Header naming the tenant (organisation) a request applies to.
pub const TENANT_HEADER: &str = "xero-tenant-id";

type PdfKey = (TenantId, InvoiceId);

/// Accounting API client.
///
/// Cheap to clone; clones share the HTTP connection pool, the credential
/// manager and the in-flight document fetches.
pub struct XeroClient<E = HttpTokenExchange> {
    inner: Arc<Inner<E>>,
}

struct Inner<E> {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialLeaseManager<E>>,
    pdf_fetches: SingleFlight<PdfKey, Result<Bytes>>,
    attempts: AttemptConfig,
}

impl<E> Clone for XeroClient<E> {
    fn clone(&self) -> Self {
        XeroClient {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for XeroClient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XeroClient")
            .field("base_url", &self.inner.base_url)
            .field("attempts", &self.inner.attempts)
            .finish_non_exhaustive()
    }
}

impl<E: TokenExchange + 'static> XeroClient<E> {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Arc<CredentialLeaseManager<E>>,
    ) -> Self {
        Self::with_attempts(http, base_url, credentials, AttemptConfig::DEFAULT)
    }

    /// Creates a client with a custom document-fetch attempt policy.
    pub fn with_attempts(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Arc<CredentialLeaseManager<E>>,
        attempts: AttemptConfig,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        XeroClient {
            inner: Arc::new(Inner {
                http,
                base_url,
                credentials,
                pdf_fetches: SingleFlight::new(),
                attempts,
            }),
        }
    }

    /// Returns the credential manager shared by this client.
    pub fn credentials(&self) -> &Arc<CredentialLeaseManager<E>> {
        &self.inner.credentials
    }
}

impl<E: TokenExchange> Inner<E> {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends an authorized request and rejects non-success statuses.
    async fn send(
        &self,
        method: Method,
        tenant: &TenantId,
        path: &str,
        configure: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let token = self.credentials.get_valid_access().await?;
        let request = self
            .http
            .request(method, self.url(path))
            .bearer_auth(token)
            .header(TENANT_HEADER, tenant.as_str());

        let response = configure(request)
            .send()
            .await
            .map_err(AccountingError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AccountingError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, tenant: &TenantId, path: &str) -> Result<T> {
        let response = self
            .send(Method::GET, tenant, path, |request| {
                request.header(ACCEPT, HeaderValue::from_static("application/json"))
            })
            .await?;
        response.json::<T>().await.map_err(AccountingError::from_reqwest)
    }

    async fn fetch_pdf_once(&self, tenant: &TenantId, id: &InvoiceId) -> Result<Bytes> {
        let response = self
            .send(Method::GET, tenant, &format!("Invoices/{id}"), |request| {
                request.header(ACCEPT, HeaderValue::from_static("application/pdf"))
            })
            .await?;
        response.bytes().await.map_err(AccountingError::from_reqwest)
    }

    async fn force_refresh(&self) -> Result<()> {
        self.credentials.force_refresh().await?;
        Ok(())
    }
}

impl<E: TokenExchange + 'static> AccountingApi for XeroClient<E> {
    #[instrument(skip_all, fields(tenant_id = %tenant, invoice_id = %id))]
    async fn get_invoice(&self, tenant: &TenantId, id: &InvoiceId) -> Result<Invoice> {
        let envelope: InvoicesEnvelope =
            self.inner.get_json(tenant, &format!("Invoices/{id}")).await?;
        envelope
            .invoices
            .into_iter()
            .next()
            .ok_or_else(|| AccountingError::missing("invoice"))
    }

    #[instrument(skip_all, fields(tenant_id = %tenant, invoice_id = %id))]
    async fn mark_as_sent(&self, tenant: &TenantId, id: &InvoiceId) -> Result<()> {
        let body = json!({
            "Invoices": [{ "InvoiceID": id, "SentToContact": true }]
        });
        self.inner
            .send(Method::POST, tenant, &format!("Invoices/{id}"), |request| {
                request.json(&body)
            })
            .await?;
        debug!("Invoice marked as sent");
        Ok(())
    }

    async fn get_organisation(&self, tenant: &TenantId) -> Result<Organisation> {
        let envelope: OrganisationsEnvelope = self.inner.get_json(tenant, "Organisation").await?;
        envelope
            .organisations
            .into_iter()
            .next()
            .ok_or_else(|| AccountingError::missing("organisation"))
    }

    #[instrument(skip_all, fields(tenant_id = %tenant, invoice_id = %id))]
    async fn get_invoice_pdf(&self, tenant: &TenantId, id: &InvoiceId) -> Result<Bytes> {
        let inner = Arc::clone(&self.inner);
        let tenant = tenant.clone();
        let id = id.clone();
        let key = (tenant.clone(), id.clone());

        self.inner
            .pdf_fetches
            .run(key, move || async move {
                with_attempts(
                    inner.attempts,
                    || inner.fetch_pdf_once(&tenant, &id),
                    || inner.force_refresh(),
                )
                .await
            })
            .await
    }

    async fn get_online_invoice_url(&self, tenant: &TenantId, id: &InvoiceId) -> Result<String> {
        let envelope: OnlineInvoicesEnvelope = self
            .inner
            .get_json(tenant, &format!("Invoices/{id}/OnlineInvoice"))
            .await?;
        envelope
            .online_invoices
            .into_iter()
            .find_map(|online| online.online_invoice_url)
            .ok_or_else(|| AccountingError::missing("online invoice URL"))
    }
}
