//! Response documents from the accounting API.
//!
//! Only the fields the notifier reads are modeled; everything else in the
//! platform's (PascalCase) JSON is ignored.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::notify::Recipients;
use crate::types::InvoiceId;

/// `GET /Invoices/{id}` response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoicesEnvelope {
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

/// An invoice as seen by the accounting platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Invoice {
    #[serde(rename = "InvoiceID")]
    pub invoice_id: InvoiceId,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub status: String,
    /// The platform's authoritative "already notified" flag.
    #[serde(default)]
    pub sent_to_contact: bool,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub amount_due: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

impl Invoice {
    /// Returns the addresses a notification for this invoice would go to,
    /// or `None` if there is nobody to send it to.
    pub fn recipients(&self) -> Option<Recipients> {
        self.contact.as_ref().and_then(Contact::recipients)
    }

    /// A label for logs and subjects: the invoice number if set, else the id.
    pub fn display_number(&self) -> &str {
        self.invoice_number
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(self.invoice_id.as_str())
    }
}

/// The customer an invoice is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub contact_persons: Vec<ContactPerson>,
}

impl Contact {
    /// The contact's own address is the primary recipient; contact persons
    /// flagged `IncludeInEmails` are copied. With no primary address the
    /// first copied person is promoted.
    pub fn recipients(&self) -> Option<Recipients> {
        let mut cc: Vec<String> = self
            .contact_persons
            .iter()
            .filter(|person| person.include_in_emails)
            .filter_map(|person| deliverable(person.email_address.as_deref()))
            .collect();

        let primary = match deliverable(self.email_address.as_deref()) {
            Some(address) => address,
            None if !cc.is_empty() => cc.remove(0),
            None => return None,
        };

        let mut seen = HashSet::from([primary.to_ascii_lowercase()]);
        cc.retain(|address| seen.insert(address.to_ascii_lowercase()));

        Some(Recipients {
            to: vec![primary],
            cc,
        })
    }
}

/// An additional person at the contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactPerson {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub include_in_emails: bool,
}

/// `GET /Organisation` response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganisationsEnvelope {
    #[serde(default)]
    pub organisations: Vec<Organisation>,
}

/// The tenant's organisation details, used for display in notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Organisation {
    pub name: String,
    #[serde(default)]
    pub legal_name: Option<String>,
}

/// `GET /Invoices/{id}/OnlineInvoice` response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OnlineInvoicesEnvelope {
    #[serde(default)]
    pub online_invoices: Vec<OnlineInvoice>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OnlineInvoice {
    #[serde(default)]
    pub online_invoice_url: Option<String>,
}

/// Returns a trimmed address if it looks deliverable.
fn deliverable(address: Option<&str>) -> Option<String> {
    let address = address?.trim();
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() || address.contains(char::is_whitespace) {
        return None;
    }
    Some(address.to_string())
}
