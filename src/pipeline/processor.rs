//! Event processor — applies classified transitions to the session store
//! and the contact log.
//!
//! Flow per event:
//! 1. Bulk broadcast check (no I/O at all)
//! 2. Session lookup by conversation key
//! 3. Classification (pure, see `rules`)
//! 4. Side effects for the transition
//!
//! Collaborator failures never escape `handle`: they are reported through
//! [`report_error`] and the event counts as processed.

use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::pipeline::format::{customer_number, format_hours, local_timestamp, weekday_abbrev};
use crate::pipeline::rules::ClassifierRules;
use crate::pipeline::types::{
    EventStream, MessageEvent, Outcome, RowFields, SessionRecord, Transition,
};
use crate::store::traits::{LogSink, SessionStore};
use crate::working_time::WorkingTime;

/// External collaborators of the processor.
#[derive(Clone)]
pub struct TrackerDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub log: Arc<dyn LogSink>,
    pub working_time: Arc<dyn WorkingTime>,
    pub clock: Arc<dyn Clock>,
}

/// Formatting settings applied to log rows.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Business offset used for timestamps and weekdays.
    pub utc_offset: FixedOffset,
    /// Suffix stripped from conversation keys to get the customer number.
    pub address_suffix: String,
}

impl ProcessorSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            utc_offset: config.utc_offset,
            address_suffix: config.address_suffix.clone(),
        }
    }
}

/// Report a failure for one event. Never fails.
pub fn report_error(error: &TrackerError, context: &str) {
    error!(error = %error, context, "Failed to process message event");
}

/// Event processor — one event at a time, to completion.
pub struct EventProcessor {
    deps: TrackerDeps,
    rules: ClassifierRules,
    settings: ProcessorSettings,
}

impl EventProcessor {
    pub fn new(deps: TrackerDeps, rules: ClassifierRules, settings: ProcessorSettings) -> Self {
        Self {
            deps,
            rules,
            settings,
        }
    }

    /// Handle a single event.
    pub async fn handle(&self, event: &MessageEvent) -> Outcome {
        if self.rules.is_bulk_broadcast(event) {
            debug!(id = %event.id, "Bulk broadcast suppressed");
            return Outcome::Suppressed;
        }

        let key = event.conversation_key().to_string();

        let session = match self.deps.sessions.get_session(&key).await {
            Ok(session) => session,
            Err(e) => {
                let e = TrackerError::from(e);
                report_error(&e, &format!("session lookup for {key} (event {})", event.id));
                return Outcome::Failed {
                    key,
                    transition: None,
                    error: e.to_string(),
                };
            }
        };

        let transition = self.rules.classify(event, session.as_ref());

        match self.apply(&key, session.as_ref(), &transition).await {
            Ok(()) => {
                if transition.has_effects() {
                    info!(
                        id = %event.id,
                        key = %key,
                        transition = transition.label(),
                        "Transition applied"
                    );
                }
                Outcome::Applied { key, transition }
            }
            Err(e) => {
                report_error(
                    &e,
                    &format!("{} for {key} (event {})", transition.label(), event.id),
                );
                Outcome::Failed {
                    key,
                    transition: Some(transition),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Drain a stream of events sequentially. Returns the number handled.
    pub async fn run(&self, mut events: EventStream) -> usize {
        let mut handled = 0usize;
        let mut failed = 0usize;

        while let Some(event) = events.next().await {
            if self.handle(&event).await.is_failed() {
                failed += 1;
            }
            handled += 1;
        }

        info!(handled, failed, "Event stream ended");
        handled
    }

    async fn apply(
        &self,
        key: &str,
        session: Option<&SessionRecord>,
        transition: &Transition,
    ) -> Result<(), TrackerError> {
        match transition {
            Transition::OpenSession => {
                self.deps.sessions.save_session(&SessionRecord::new(key)).await?;
            }
            Transition::SelectSector { sector, .. } | Transition::Redirect { sector } => {
                self.record_contact(key, sector).await?;
            }
            Transition::CancelSession => {
                self.deps.sessions.clear_session(key).await?;
            }
            Transition::CloseWithReply => {
                let (selected_at, position) = session
                    .and_then(SessionRecord::service_window)
                    .ok_or_else(|| TrackerError::IncompleteSession {
                        key: key.to_string(),
                        field: "service window",
                    })?;

                let now = self.deps.clock.now();
                let elapsed = self.deps.working_time.elapsed_hours(selected_at, now);
                let row = RowFields::reply(&local_timestamp(&self.local(now)), &format_hours(elapsed));

                self.deps.log.update_row(position, &row).await?;
                self.deps.sessions.clear_session(key).await?;
                debug!(key = %key, %position, elapsed = %elapsed, "Reply recorded");
            }
            Transition::Hold { reply } => {
                debug!(key = %key, reply = ?reply, "Holding reply, session kept");
            }
            Transition::Ignore => {}
        }
        Ok(())
    }

    /// Append a contact row for `sector` and start the service window.
    async fn record_contact(&self, key: &str, sector: &str) -> Result<(), TrackerError> {
        let now = self.deps.clock.now();
        let local = self.local(now);
        let row = RowFields::contact(
            customer_number(key, &self.settings.address_suffix),
            sector,
            &local_timestamp(&local),
            weekday_abbrev(local.weekday()),
        );

        match self.deps.log.append_row(&row).await? {
            Some(position) => {
                let session = SessionRecord::new(key).with_selection(sector, now, position);
                self.deps.sessions.save_session(&session).await?;
                debug!(key = %key, sector, %position, "Contact recorded");
            }
            None => {
                warn!(key = %key, sector, "Contact log returned no position, session left unselected");
            }
        }
        Ok(())
    }

    fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.settings.utc_offset)
    }
}
