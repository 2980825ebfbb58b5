//! The Dispatcher/Worker Pool (spec.md section 4.5): claims leased jobs,
//! calls the external enhancement provider under a deadline, and finalizes
//! each job with refund-on-failure. Grounded on
//! `original_source/services/worker/worker.py` (`poll_jobs` / `process_job`
//! / `cleanup_stuck_jobs`), restructured around the transaction functions
//! in `crate::repository::transactions` rather than a long-lived ORM
//! session.
//!
//! This module holds the reusable logic; `luster-worker`'s `main` is a
//! thin binary that constructs a [`Dispatcher`] from configuration and
//! drives it plus [`sweeper::run_sweeper`] as two concurrent tasks — the
//! same "domain crate owns the logic, app/binary crate owns the wiring"
//! split as `luster_jobs::routes()` vs. `crates/app`.

mod dispatcher;
mod metadata;
mod sweeper;

pub use dispatcher::Dispatcher;
pub use sweeper::run_sweeper;
