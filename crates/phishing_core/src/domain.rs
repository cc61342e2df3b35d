//! crates/phishing_core/src/domain.rs
//!
//! Defines the pure, core data structures for the tracker: the ordered status
//! milestones, the per-target record and the per-pool aggregate.
//! These structs are independent of any database or transport.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

//=========================================================================================
// Status Lattice
//=========================================================================================

/// A milestone reached by a target. The variants are totally ordered:
/// `Sent < Opened < Clicked < Phished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Sent = 1,
    Opened = 2,
    Clicked = 3,
    Phished = 4,
}

/// An ordered set of milestones, e.g. the ones newly reached by an upgrade.
pub type StatusSet = BTreeSet<Status>;

impl Status {
    /// Every milestone, lowest first.
    pub const ALL: [Status; 4] = [Status::Sent, Status::Opened, Status::Clicked, Status::Phished];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Sent => "sent",
            Status::Opened => "opened",
            Status::Clicked => "clicked",
            Status::Phished => "phished",
        }
    }

    /// The milestones at or below `self`, lowest first.
    pub fn and_below(self) -> impl Iterator<Item = Status> {
        Status::ALL.into_iter().filter(move |s| *s <= self)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Target
//=========================================================================================

/// Anonymous recipient of a campaign message.
///
/// Only a random identifier is stored; the recipient's address is never linked
/// to it. Timestamps are monotone along the status order: when `clicked_at` is
/// set, `opened_at` is set too and is not later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub phished_at: Option<DateTime<Utc>>,
}

impl Target {
    /// A target that has not reached any milestone yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sent_at: None,
            opened_at: None,
            clicked_at: None,
            phished_at: None,
        }
    }

    pub fn reached_at(&self, status: Status) -> Option<DateTime<Utc>> {
        match status {
            Status::Sent => self.sent_at,
            Status::Opened => self.opened_at,
            Status::Clicked => self.clicked_at,
            Status::Phished => self.phished_at,
        }
    }

    fn slot(&mut self, status: Status) -> &mut Option<DateTime<Utc>> {
        match status {
            Status::Sent => &mut self.sent_at,
            Status::Opened => &mut self.opened_at,
            Status::Clicked => &mut self.clicked_at,
            Status::Phished => &mut self.phished_at,
        }
    }

    /// The highest milestone recorded so far, if any.
    pub fn furthest(&self) -> Option<Status> {
        Status::ALL
            .into_iter()
            .rev()
            .find(|s| self.reached_at(*s).is_some())
    }

    /// Returns the milestones at or below `new_status` that are not recorded yet.
    ///
    /// Skipped milestones are included, so asking for `Clicked` on a target that
    /// never opened yields `{Opened, Clicked}`. Asking for anything already
    /// covered yields the empty set.
    pub fn diff_to_reach(&self, new_status: Status) -> StatusSet {
        new_status
            .and_below()
            .filter(|s| self.reached_at(*s).is_none())
            .collect()
    }

    /// Records every milestone of `diff_to_reach(new_status)` with the same
    /// timestamp `at` and returns them.
    ///
    /// This is the in-memory half of the store's atomic upgrade; callers must
    /// hold whatever lock or transaction guards the record.
    pub fn upgrade(&mut self, new_status: Status, at: DateTime<Utc>) -> StatusSet {
        let reached = self.diff_to_reach(new_status);
        for status in &reached {
            *self.slot(*status) = Some(at);
        }
        reached
    }

    /// Administrative reset: clears every timestamp.
    pub fn reset(&mut self) {
        for status in Status::ALL {
            *self.slot(status) = None;
        }
    }
}

//=========================================================================================
// Pool
//=========================================================================================

/// Aggregated results for one (group, template) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub id: String,
    pub group: String,
    pub template: String,
    pub sent_count: u64,
    pub opened_count: u64,
    pub clicked_count: u64,
    pub phished_count: u64,
}

impl Pool {
    pub fn new(id: impl Into<String>, group: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: group.into(),
            template: template.into(),
            sent_count: 0,
            opened_count: 0,
            clicked_count: 0,
            phished_count: 0,
        }
    }

    pub fn count(&self, status: Status) -> u64 {
        match status {
            Status::Sent => self.sent_count,
            Status::Opened => self.opened_count,
            Status::Clicked => self.clicked_count,
            Status::Phished => self.phished_count,
        }
    }

    fn counter(&mut self, status: Status) -> &mut u64 {
        match status {
            Status::Sent => &mut self.sent_count,
            Status::Opened => &mut self.opened_count,
            Status::Clicked => &mut self.clicked_count,
            Status::Phished => &mut self.phished_count,
        }
    }

    /// Adds one to the counter of every milestone in `statuses`.
    pub fn apply_increment(&mut self, statuses: &StatusSet) {
        for status in statuses {
            *self.counter(*status) += 1;
        }
    }

    /// Administrative reset: zeroes every counter.
    pub fn reset(&mut self) {
        for status in Status::ALL {
            *self.counter(status) = 0;
        }
    }
}

//=========================================================================================
// Tracking Context
//=========================================================================================

/// What a tracked request hands to the response producer once the target and
/// its pool have been updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingContext {
    pub target_id: String,
    pub pool_id: String,
    pub group: String,
    pub template: String,
}
