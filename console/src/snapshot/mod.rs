//! Snapshot job lifecycle
//!
//! Applies the poll registry to snapshot creation and deletion:
//!
//! - **create**: submit, show a pending row, poll `snapshot-{vm}`
//! - **delete**: mark the row as deleting before the request returns, then
//!   poll; a rejected request rolls the row back
//! - **reconcile**: every poll response either patches the matching row in
//!   place or reloads the whole list; `finishedRemote` stops the poll
//!
//! Only one registration per VM exists for this domain: any new create or
//! delete supersedes the running one.

pub mod lifecycle;
pub mod table;

pub use lifecycle::{SnapshotLifecycle, SnapshotProgress};
pub use table::{RowSync, SnapshotRow, SnapshotTable};
