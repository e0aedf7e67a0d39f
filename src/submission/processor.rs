//! Submission processing — the pipeline from decoded payload to finalized
//! outcome: validate, stage, compose, dispatch, clean up.
//!
//! Two response-timing policies: Synchronous holds the HTTP response until the
//! transport settles; Deferred responds right after validation and runs the
//! dispatch as a tracked background task. Either way the staged attachment is
//! released exactly once, after dispatch settles, on every path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::config::{IntakeConfig, ResponsePolicy};
use crate::error::Error;
use crate::mail::compose::{self, ComposedMessage};
use crate::mail::transport::{DeliveryOutcome, MailTransport};
use crate::submission::attachment::{self, Upload};
use crate::submission::fields::{self, FieldMap};

/// Caller-visible message once the transport has accepted the email.
pub const DELIVERED_MESSAGE: &str = "Form submitted & email sent successfully!";

/// Caller-visible message when delivery continues in the background.
pub const ACCEPTED_MESSAGE: &str = "Form submitted, your application will be delivered shortly.";

/// One decoded submission: ordered fields plus the optional résumé upload.
#[derive(Debug)]
pub struct Submission {
    pub fields: FieldMap,
    pub upload: Option<Upload>,
    pub received_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(fields: FieldMap, upload: Option<Upload>) -> Self {
        Self {
            fields,
            upload,
            received_at: Utc::now(),
        }
    }
}

/// Counts in-flight deferred dispatches so shutdown can wait for their cleanup
/// and outcome logging instead of dropping tasks mid-delivery.
#[derive(Clone, Default)]
pub struct DispatchTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    in_flight: AtomicUsize,
    settled: Notify,
}

/// Registration token for one dispatch; the slot frees when it drops.
pub struct DispatchGuard {
    inner: Arc<TrackerInner>,
}

impl DispatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> DispatchGuard {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        DispatchGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every registered dispatch has settled.
    pub async fn drain(&self) {
        loop {
            let settled = self.inner.settled.notified();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            settled.await;
        }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.settled.notify_waiters();
    }
}

/// Drives one submission through the pipeline.
pub struct Processor {
    config: Arc<IntakeConfig>,
    transport: Arc<dyn MailTransport>,
    tracker: DispatchTracker,
}

impl Processor {
    pub fn new(config: Arc<IntakeConfig>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            config,
            transport,
            tracker: DispatchTracker::new(),
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn tracker(&self) -> &DispatchTracker {
        &self.tracker
    }

    /// Handle one submission to its caller-visible conclusion.
    ///
    /// Validation and staging failures return before the transport is ever
    /// touched. The transport is invoked at most once.
    pub async fn process(&self, submission: Submission) -> Result<String, Error> {
        fields::validate(&submission.fields)?;

        let staged = match submission.upload {
            Some(upload) => Some(attachment::stage(upload, &self.config).await?),
            None => None,
        };

        tracing::info!(
            fields = submission.fields.len(),
            has_attachment = staged.is_some(),
            "Submission validated"
        );

        let message = compose::compose(
            &submission.fields,
            staged,
            &self.config.mail_user,
            &self.config.recipient,
        );

        match self.config.response_policy {
            ResponsePolicy::Synchronous => {
                match dispatch_and_release(self.transport.as_ref(), message).await {
                    DeliveryOutcome::Sent => Ok(DELIVERED_MESSAGE.to_string()),
                    DeliveryOutcome::Failed(e) => Err(Error::Delivery(e)),
                }
            }
            ResponsePolicy::Deferred => {
                let transport = Arc::clone(&self.transport);
                let guard = self.tracker.register();
                let subject = message.subject.clone();
                let received_at = submission.received_at;

                tokio::spawn(async move {
                    let _guard = guard;
                    let outcome = dispatch_and_release(transport.as_ref(), message).await;
                    let latency_ms = (Utc::now() - received_at).num_milliseconds();
                    match outcome {
                        DeliveryOutcome::Sent => {
                            tracing::info!(subject = %subject, latency_ms, "Deferred delivery complete");
                        }
                        DeliveryOutcome::Failed(reason) => {
                            tracing::error!(subject = %subject, latency_ms, %reason, "Deferred delivery failed");
                        }
                    }
                });

                Ok(ACCEPTED_MESSAGE.to_string())
            }
        }
    }
}

/// Dispatch a composed message, then release the staged attachment.
///
/// Cleanup runs after the transport call settles — the staged file must still
/// exist while the transport reads it — and runs on the failure path too.
/// A cleanup failure is logged, never surfaced: the email may already be out.
async fn dispatch_and_release(
    transport: &dyn MailTransport,
    message: ComposedMessage,
) -> DeliveryOutcome {
    let result = transport.send(&message).await;

    if let Some(staged) = message.into_attachment() {
        let staged_path = staged.staged_path().map(|p| p.display().to_string());
        if let Err(e) = staged.discard().await {
            tracing::warn!(staged_path = staged_path.as_deref(), error = %e, "Attachment cleanup failed");
        }
    }

    match result {
        Ok(()) => DeliveryOutcome::Sent,
        Err(e) => DeliveryOutcome::Failed(e),
    }
}
