//! JSON mail relay transport.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{Notification, Notifier, NotifyError, Result};

/// Posts notifications to an HTTP mail relay.
///
/// The request body is JSON with the attachment base64-encoded; the API key,
/// if set, is sent as a bearer token.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: String,
}

impl fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMailer")
            .field("url", &self.url)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: &'a [String],
    cc: &'a [String],
    subject: &'a str,
    text: String,
    attachments: Vec<OutgoingAttachment<'a>>,
}

#[derive(Serialize)]
struct OutgoingAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    content: String,
}

impl HttpMailer {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        api_key: Option<String>,
        from: impl Into<String>,
    ) -> Self {
        HttpMailer {
            client,
            url: url.into(),
            api_key,
            from: from.into(),
        }
    }
}

impl Notifier for HttpMailer {
    #[instrument(skip_all, fields(subject = %notification.subject))]
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = OutgoingMessage {
            from: &self.from,
            to: &notification.recipients.to,
            cc: &notification.recipients.cc,
            subject: &notification.subject,
            text: notification.text_body(),
            attachments: notification
                .attachment
                .iter()
                .map(|a| OutgoingAttachment {
                    filename: &a.file_name,
                    content_type: &a.content_type,
                    content: STANDARD.encode(&a.content),
                })
                .collect(),
        };

        let mut request = self.client.post(&self.url).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Notification accepted by relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Attachment, Recipients};
    use crate::test_utils::spawn_http;
    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use bytes::Bytes;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn record(
        State((captured, status)): State<(Captured, StatusCode)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, &'static str) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        captured.lock().unwrap().push((auth, body));
        (status, "relay says no")
    }

    async fn relay(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route("/send", post(record))
            .with_state((captured.clone(), status));
        (format!("{}/send", spawn_http(app).await), captured)
    }

    fn notification() -> Notification {
        Notification {
            recipients: Recipients {
                to: vec!["ap@acme.example".to_string()],
                cc: vec!["ann@acme.example".to_string()],
            },
            subject: "Invoice INV-7".to_string(),
            invoice_number: "INV-7".to_string(),
            organisation_name: None,
            amount_due: None,
            currency: None,
            online_url: None,
            attachment: Some(Attachment {
                file_name: "INV-7.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                content: Bytes::from_static(b"%PDF"),
            }),
        }
    }

    #[tokio::test]
    async fn posts_message_with_encoded_attachment() {
        let (url, captured) = relay(StatusCode::OK).await;
        let mailer = HttpMailer::new(
            reqwest::Client::new(),
            url,
            Some("key-123".to_string()),
            "billing@demo.example",
        );

        mailer.send(&notification()).await.unwrap();

        let captured = captured.lock().unwrap();
        let (auth, body) = &captured[0];
        assert_eq!(auth.as_deref(), Some("Bearer key-123"));
        assert_eq!(body["from"], "billing@demo.example");
        assert_eq!(body["to"][0], "ap@acme.example");
        assert_eq!(body["cc"][0], "ann@acme.example");
        assert_eq!(body["attachments"][0]["filename"], "INV-7.pdf");
        assert_eq!(body["attachments"][0]["content"], "JVBERg==");
    }

    #[tokio::test]
    async fn relay_rejection_is_an_error() {
        let (url, _captured) = relay(StatusCode::BAD_GATEWAY).await;
        let mailer = HttpMailer::new(reqwest::Client::new(), url, None, "billing@demo.example");

        let err = mailer.send(&notification()).await.unwrap_err();

        assert!(matches!(err, NotifyError::Rejected { status: 502, .. }));
    }
}
