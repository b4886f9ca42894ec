//! Notification dispatcher — best-effort webhooks on filing and assignment.
//!
//! RULES:
//!   - Dispatch never blocks or fails the transition that triggered it.
//!     The engine hands a [`Notification`] to a [`Notifier`] and moves on.
//!   - At most once. No retry queue, no durability.
//!   - Failures are logged here and go no further.
//!
//! [`WebhookDispatcher`] owns a worker thread fed over a bounded channel.
//! The worker POSTs a form-encoded body with a per-request timeout. A full
//! queue drops new notifications, and one that waited too long is dropped
//! before it is sent.

use crate::{
    complaint::Complaint,
    config::WebhookConfig,
    contractor::Contractor,
    types::Timestamp,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

// ── Error ──────────────────────────────────────────────────────────

/// Why a single delivery failed. Only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Could not start dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ── Payloads ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Created,
    Assigned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintNotice {
    pub complaint_id: String,
    pub reference_number: String,
    pub citizen_name: String,
    pub citizen_phone: String,
    pub category: String,
    pub description: String,
    pub address: Option<String>,
    pub photo_url: Option<String>,
    pub status: String,
    pub created_at: Timestamp,
}

impl From<&Complaint> for ComplaintNotice {
    fn from(c: &Complaint) -> Self {
        Self {
            complaint_id: c.complaint_id.clone(),
            reference_number: c.reference_number(),
            citizen_name: c.citizen_name.clone(),
            citizen_phone: c.citizen_phone.clone(),
            category: c.category.to_string(),
            description: c.description.clone(),
            address: c.address.clone(),
            photo_url: c.photo_url.clone(),
            status: c.status.to_string(),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorNotice {
    pub contractor_id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl From<&Contractor> for ContractorNotice {
    fn from(c: &Contractor) -> Self {
        Self {
            contractor_id: c.contractor_id.clone(),
            name: c.name.clone(),
            phone: c.phone.clone(),
            email: c.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    ComplaintCreated(ComplaintNotice),
    ComplaintAssigned {
        complaint: ComplaintNotice,
        contractor: ContractorNotice,
        assigned_at: Timestamp,
    },
}

impl Notification {
    pub fn created(complaint: &Complaint) -> Self {
        Self::ComplaintCreated(complaint.into())
    }

    pub fn assigned(complaint: &Complaint, contractor: &Contractor, assigned_at: Timestamp) -> Self {
        Self::ComplaintAssigned {
            complaint: complaint.into(),
            contractor: contractor.into(),
            assigned_at,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::ComplaintCreated(_) => NotificationKind::Created,
            Self::ComplaintAssigned { .. } => NotificationKind::Assigned,
        }
    }

    pub fn complaint_id(&self) -> &str {
        match self {
            Self::ComplaintCreated(c) => &c.complaint_id,
            Self::ComplaintAssigned { complaint, .. } => &complaint.complaint_id,
        }
    }

    /// Flat key/value body. Absent optionals are sent as empty strings so
    /// the receiving automation always sees the same keys.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let (complaint, extra) = match self {
            Self::ComplaintCreated(c) => (c, None),
            Self::ComplaintAssigned {
                complaint,
                contractor,
                assigned_at,
            } => (complaint, Some((contractor, assigned_at))),
        };

        let mut fields = vec![
            ("complaint_id", complaint.complaint_id.clone()),
            ("reference_number", complaint.reference_number.clone()),
            ("citizen_name", complaint.citizen_name.clone()),
            ("citizen_phone", complaint.citizen_phone.clone()),
            ("category", complaint.category.clone()),
            ("description", complaint.description.clone()),
            ("address", complaint.address.clone().unwrap_or_default()),
            ("photo_url", complaint.photo_url.clone().unwrap_or_default()),
            ("status", complaint.status.clone()),
            ("created_at", complaint.created_at.to_rfc3339()),
        ];
        if let Some((contractor, assigned_at)) = extra {
            fields.extend([
                ("contractor_id", contractor.contractor_id.clone()),
                ("contractor_name", contractor.name.clone()),
                ("contractor_phone", contractor.phone.clone()),
                ("contractor_email", contractor.email.clone().unwrap_or_default()),
                ("assigned_at", assigned_at.to_rfc3339()),
            ]);
        }
        fields
    }
}

// ── Notifier seam ──────────────────────────────────────────────────

/// Hand-off point between the engine and whatever delivers notifications.
/// Implementations must return promptly and must not fail.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    /// Flush anything still pending. Called once when the engine stops.
    fn close(&self) {}
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, notification: Notification) {
        log::trace!("notification dropped: {:?}", notification.kind());
    }
}

/// Keeps every notification in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications().iter().filter(|n| n.kind() == kind).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification);
        }
    }
}

// ── Webhook dispatcher ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Accepted onto the queue.
    pub queued: u64,
    pub attempted: u64,
    pub delivered: u64,
    pub failed: u64,
    /// No destination configured for the kind.
    pub skipped: u64,
    /// Waited past `max_queue_wait` and was never sent.
    pub expired: u64,
    /// Refused because the queue was full. Never counted as queued.
    pub dropped: u64,
}

impl DispatchStats {
    fn settled(&self) -> u64 {
        self.delivered + self.failed + self.skipped + self.expired
    }

    /// Queued notifications not yet settled, the one in flight included.
    pub fn backlog(&self) -> u64 {
        self.queued.saturating_sub(self.settled())
    }
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    attempted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    expired: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            queued: self.queued.load(Ordering::SeqCst),
            attempted: self.attempted.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            expired: self.expired.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone)]
struct Targets {
    created_url: Option<String>,
    assigned_url: Option<String>,
}

impl Targets {
    fn url_for(&self, kind: NotificationKind) -> Option<&str> {
        match kind {
            NotificationKind::Created => self.created_url.as_deref(),
            NotificationKind::Assigned => self.assigned_url.as_deref(),
        }
    }
}

/// A notification plus the moment it joined the queue.
struct Queued {
    notification: Notification,
    enqueued_at: Instant,
}

pub struct WebhookDispatcher {
    sender: Mutex<Option<mpsc::SyncSender<Queued>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
    /// Longest a close waits for the worker to drain.
    drain_limit: Duration,
}

impl WebhookDispatcher {
    /// Start the worker thread.
    pub fn spawn(config: &WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()?;
        let targets = Targets {
            created_url: config.created_url.clone(),
            assigned_url: config.assigned_url.clone(),
        };
        let max_wait = config.max_queue_wait();

        let (tx, rx) = mpsc::sync_channel::<Queued>(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);

        let worker = thread::Builder::new()
            .name("webhook-dispatch".into())
            .spawn(move || {
                for item in rx {
                    let waited = item.enqueued_at.elapsed();
                    if waited > max_wait {
                        worker_counters.expired.fetch_add(1, Ordering::SeqCst);
                        log::warn!(
                            "{:?} notification for {} expired after {waited:?} in queue",
                            item.notification.kind(),
                            item.notification.complaint_id()
                        );
                        continue;
                    }
                    deliver(&client, &targets, &item.notification, &worker_counters);
                }
                log::debug!("webhook dispatcher drained; worker exiting");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            counters,
            // Anything older than max_wait is skipped without a request, so
            // the drain ends within one wait window plus one request.
            drain_limit: max_wait + config.timeout() * 2,
        })
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Block until every queued notification has settled (sent or given up),
    /// or until `limit` passes. Returns the counters at that moment.
    pub fn wait_idle(&self, limit: Duration) -> DispatchStats {
        let deadline = Instant::now() + limit;
        loop {
            let stats = self.stats();
            if stats.backlog() == 0 || Instant::now() >= deadline {
                return stats;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Stop accepting work, let the worker drain, and join it. Gives up on
    /// the worker after the drain limit; what it still holds is lost.
    pub fn shutdown(&self) -> DispatchStats {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let deadline = Instant::now() + self.drain_limit;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    log::error!("webhook dispatcher worker panicked");
                }
            } else {
                log::warn!(
                    "webhook dispatcher still busy after {:?}; abandoning {} notification(s)",
                    self.drain_limit,
                    self.stats().backlog()
                );
            }
        }
        self.stats()
    }
}

impl Notifier for WebhookDispatcher {
    fn notify(&self, notification: Notification) {
        let Ok(sender) = self.sender.lock() else {
            log::warn!("dispatcher lock poisoned; dropping notification");
            return;
        };
        let Some(tx) = sender.as_ref() else {
            log::warn!(
                "dispatcher shut down; dropping {:?} notification for {}",
                notification.kind(),
                notification.complaint_id()
            );
            return;
        };
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        let item = Queued {
            notification,
            enqueued_at: Instant::now(),
        };
        match tx.try_send(item) {
            Ok(()) => {}
            Err(mpsc::TrySendError::Full(lost)) => {
                self.counters.queued.fetch_sub(1, Ordering::SeqCst);
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                log::warn!(
                    "webhook queue full; dropping {:?} notification for {}",
                    lost.notification.kind(),
                    lost.notification.complaint_id()
                );
            }
            Err(mpsc::TrySendError::Disconnected(lost)) => {
                self.counters.queued.fetch_sub(1, Ordering::SeqCst);
                log::warn!(
                    "dispatcher worker gone; dropping {:?} notification for {}",
                    lost.notification.kind(),
                    lost.notification.complaint_id()
                );
            }
        }
    }

    fn close(&self) {
        let stats = self.shutdown();
        log::info!(
            "webhook dispatcher closed: {} delivered, {} failed, {} expired, {} dropped",
            stats.delivered,
            stats.failed,
            stats.expired,
            stats.dropped
        );
    }
}

impl Drop for WebhookDispatcher {
    fn drop(&mut self) {
        // Queued notifications still get their attempt before the thread goes.
        self.shutdown();
    }
}

fn deliver(
    client: &reqwest::blocking::Client,
    targets: &Targets,
    notification: &Notification,
    counters: &Counters,
) {
    let kind = notification.kind();
    let Some(url) = targets.url_for(kind) else {
        log::debug!("no webhook configured for {kind:?}; skipping");
        counters.skipped.fetch_add(1, Ordering::SeqCst);
        return;
    };

    counters.attempted.fetch_add(1, Ordering::SeqCst);
    match try_send(client, url, notification) {
        Ok(()) => {
            counters.delivered.fetch_add(1, Ordering::SeqCst);
            log::debug!("{kind:?} webhook delivered for {}", notification.complaint_id());
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            log::warn!(
                "{kind:?} webhook for {} failed: {e}",
                notification.complaint_id()
            );
        }
    }
}

fn try_send(
    client: &reqwest::blocking::Client,
    url: &str,
    notification: &Notification,
) -> Result<(), NotifyError> {
    let response = client.post(url).form(&notification.form_fields()).send()?;
    if !response.status().is_success() {
        return Err(NotifyError::HttpStatus(response.status().as_u16()));
    }
    Ok(())
}
