//! Message event pipeline.
//!
//! Every message seen on the business account flows through:
//! 1. `MessageSource::start()` — source-specific I/O, merged into one stream
//! 2. `ClassifierRules::classify()` — pure decision on event + session
//! 3. `EventProcessor::handle()` — session store and contact log effects
//!
//! Failures are reported per event and never stop the stream.

pub mod format;
pub mod processor;
pub mod rules;
pub mod types;

pub use processor::{EventProcessor, ProcessorSettings, TrackerDeps, report_error};
pub use rules::{ClassifierRules, HoldingReply};
pub use types::{EventStream, MessageEvent, Outcome, RowFields, RowPosition, SessionRecord, Transition};
