//! Business queries composed on top of the latest-version view.
//!
//! Each repository only adds domain predicates; the view guarantees one row per
//! id, and that row is the id's highest version.

use crate::core::descriptor::EntityDescriptor;
use crate::core::error::ScdError;
use crate::models::{Job, PaymentLineItem, Timelog};
use crate::versioning::view::{Cmp, LatestView};
use rusqlite::Connection;

pub const STATUS_ACTIVE: &str = "active";

pub struct JobRepo<'c> {
    conn: &'c Connection,
    jobs: EntityDescriptor,
}

impl<'c> JobRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            jobs: Job::descriptor(),
        }
    }

    pub fn find_active_jobs_by_company(&self, company_id: &str) -> Result<Vec<Job>, ScdError> {
        LatestView::new(&self.jobs)
            .filter_eq("status", STATUS_ACTIVE.to_string())
            .filter_eq("company_id", company_id.to_string())
            .fetch(self.conn)
    }

    pub fn find_active_jobs_by_contractor(
        &self,
        contractor_id: &str,
    ) -> Result<Vec<Job>, ScdError> {
        LatestView::new(&self.jobs)
            .filter_eq("status", STATUS_ACTIVE.to_string())
            .filter_eq("contractor_id", contractor_id.to_string())
            .fetch(self.conn)
    }
}

pub struct TimelogRepo<'c> {
    conn: &'c Connection,
    timelogs: EntityDescriptor,
    jobs: EntityDescriptor,
}

impl<'c> TimelogRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            timelogs: Timelog::descriptor(),
            jobs: Job::descriptor(),
        }
    }

    /// Latest timelogs whose referenced job version belongs to `contractor_id`
    /// and that lie entirely inside `[from, to]` (epoch seconds).
    pub fn find_timelogs_by_contractor_and_period(
        &self,
        contractor_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Timelog>, ScdError> {
        LatestView::new(&self.timelogs)
            .join_reference("job_uid", &self.jobs, "j")
            .filter_joined("j", "contractor_id", Cmp::Eq, contractor_id.to_string())
            .filter("time_start", Cmp::Ge, from)
            .filter("time_end", Cmp::Le, to)
            .fetch(self.conn)
    }
}

pub struct PaymentLineItemRepo<'c> {
    conn: &'c Connection,
    items: EntityDescriptor,
    jobs: EntityDescriptor,
    timelogs: EntityDescriptor,
}

impl<'c> PaymentLineItemRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            items: PaymentLineItem::descriptor(),
            jobs: Job::descriptor(),
            timelogs: Timelog::descriptor(),
        }
    }

    pub fn find_line_items_by_contractor_and_period(
        &self,
        contractor_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<PaymentLineItem>, ScdError> {
        LatestView::new(&self.items)
            .join_reference("job_uid", &self.jobs, "j")
            .join_reference("timelog_uid", &self.timelogs, "tl")
            .filter_joined("j", "contractor_id", Cmp::Eq, contractor_id.to_string())
            .filter_joined("tl", "time_start", Cmp::Ge, from)
            .filter_joined("tl", "time_end", Cmp::Le, to)
            .fetch(self.conn)
    }
}
