pub mod config;
pub mod constants;
pub mod cron_clock;
pub mod dispatcher;
pub mod errors;
pub mod execution;
pub mod http;
pub mod model;
pub mod notify;
pub mod poller;
pub mod report;
pub mod schedule;
pub mod snapshot;

// Re-export commonly used types
pub use config::{ConfigManager, ConsoleConfig};
pub use cron_clock::{CronClock, CronExpression};
pub use dispatcher::{OperationDispatcher, Submission};
pub use errors::{ConsoleError, CronError, RemoteError, Result};
pub use execution::ExecutionMonitor;
pub use http::{HttpTransport, Transport, VmApi};
pub use model::{JobKey, JobStatus, Schedule, Snapshot, SnapshotTask, VmOperation};
pub use notify::{Notification, Notifier};
pub use poller::{PollDirective, PollRegistry, PollState};
pub use report::{ReportExporter, ReportKind};
pub use schedule::ScheduleStore;
pub use snapshot::{SnapshotLifecycle, SnapshotProgress, SnapshotTable};
