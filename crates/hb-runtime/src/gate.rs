//! Completion gate: orders test bodies and timer continuations on a virtual
//! clock so capture only happens once everything the script started is done.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use hb_core::{ScriptExecutionError, SCRIPT_BUDGET_EXCEEDED};
use rhai::FnPtr;
use tracing::debug;

/// The top-level script.
const SCRIPT_LINK: usize = 0;

#[derive(Debug, Clone)]
struct Link {
    id: usize,
    test: String,
    body: FnPtr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Part of a main-chain link; the link is not settled until it runs.
    Awaited { link: usize },
    /// Joined best-effort after the chain.
    Detached,
}

#[derive(Debug, Clone)]
struct Timer {
    kind: TimerKind,
    test: Option<String>,
    callback: FnPtr,
}

/// One unit of work handed to the driver.
#[derive(Debug, Clone)]
pub(crate) enum Job {
    Body {
        test: String,
        body: FnPtr,
    },
    Continuation {
        detached: bool,
        test: Option<String>,
        callback: FnPtr,
    },
}

impl Job {
    pub(crate) fn test(&self) -> Option<&str> {
        match self {
            Self::Body { test, .. } => Some(test),
            Self::Continuation { test, .. } => test.as_deref(),
        }
    }

    pub(crate) fn is_detached(&self) -> bool {
        matches!(self, Self::Continuation { detached: true, .. })
    }

    pub(crate) fn callback(&self) -> &FnPtr {
        match self {
            Self::Body { body, .. } => body,
            Self::Continuation { callback, .. } => callback,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompletionGate {
    links: VecDeque<Link>,
    timers: BTreeMap<(u64, u64), Timer>,
    now: u64,
    sequence: u64,
    next_link: usize,
    active_link: usize,
    in_detached: bool,
    max_jobs: usize,
    jobs_run: usize,
}

pub(crate) type SharedGate = Rc<RefCell<CompletionGate>>;

impl CompletionGate {
    pub(crate) fn new(max_jobs: usize) -> Self {
        Self {
            links: VecDeque::new(),
            timers: BTreeMap::new(),
            now: 0,
            sequence: 0,
            next_link: SCRIPT_LINK + 1,
            active_link: SCRIPT_LINK,
            in_detached: false,
            max_jobs,
            jobs_run: 0,
        }
    }

    /// Appends a test body to the main chain.
    pub(crate) fn enqueue_test(&mut self, test: &str, body: FnPtr) {
        let id = self.next_link;
        self.next_link += 1;
        debug!(link = id, test, "test body queued");
        self.links.push_back(Link {
            id,
            test: test.to_string(),
            body,
        });
    }

    /// Schedules `callback` after `delay_ms` of virtual time. Awaited
    /// continuations hold up the link that scheduled them; continuations
    /// scheduled from a detached one stay detached.
    pub(crate) fn schedule(
        &mut self,
        delay_ms: u64,
        callback: FnPtr,
        awaited: bool,
        test: Option<String>,
    ) {
        let due = self.now.saturating_add(delay_ms);
        let kind = if awaited && !self.in_detached {
            TimerKind::Awaited {
                link: self.active_link,
            }
        } else {
            TimerKind::Detached
        };
        debug!(due, sequence = self.sequence, ?kind, "continuation scheduled");
        self.timers.insert(
            (due, self.sequence),
            Timer {
                kind,
                test,
                callback,
            },
        );
        self.sequence += 1;
    }

    pub(crate) fn now(&self) -> u64 {
        self.now
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.links.is_empty() && self.timers.is_empty()
    }

    fn active_link_pending(&self) -> bool {
        let active = self.active_link;
        self.timers
            .values()
            .any(|timer| timer.kind == TimerKind::Awaited { link: active })
    }

    /// Next job in settlement order: the active link's continuations (and
    /// anything due before them), then the next link, then the side list.
    pub(crate) fn next_job(&mut self) -> Result<Option<Job>, ScriptExecutionError> {
        let job = if self.active_link_pending() {
            self.pop_timer()
        } else if let Some(link) = self.links.pop_front() {
            self.active_link = link.id;
            self.in_detached = false;
            Some(Job::Body {
                test: link.test,
                body: link.body,
            })
        } else {
            self.pop_timer()
        };

        if job.is_some() {
            self.jobs_run += 1;
            if self.jobs_run > self.max_jobs {
                return Err(ScriptExecutionError::new(
                    SCRIPT_BUDGET_EXCEEDED,
                    format!(
                        "Script scheduled more than {} tests and continuations",
                        self.max_jobs
                    ),
                ));
            }
        }
        Ok(job)
    }

    fn pop_timer(&mut self) -> Option<Job> {
        let ((due, sequence), timer) = self.timers.pop_first()?;
        self.now = self.now.max(due);
        self.in_detached = timer.kind == TimerKind::Detached;
        debug!(due, sequence, kind = ?timer.kind, "continuation due");
        Some(Job::Continuation {
            detached: self.in_detached,
            test: timer.test,
            callback: timer.callback,
        })
    }
}
