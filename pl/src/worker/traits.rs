//! Capabilities the stage runtimes are built from

use crate::wire::WorkItem;

/// Stage-1 intake: produce the next raw work item
pub trait ItemSource: Send {
    fn next_item(&mut self) -> WorkItem;
}

/// Pass/fail check used by stages 1 and 3
pub trait Inspect: Send {
    fn inspect(&mut self, item: &WorkItem) -> bool;
}

/// Stage-2 processing step
pub trait Transform: Send {
    fn transform(&mut self, item: WorkItem) -> WorkItem;
}

impl<F> ItemSource for F
where
    F: FnMut() -> WorkItem + Send,
{
    fn next_item(&mut self) -> WorkItem {
        self()
    }
}

impl<F> Inspect for F
where
    F: FnMut(&WorkItem) -> bool + Send,
{
    fn inspect(&mut self, item: &WorkItem) -> bool {
        self(item)
    }
}
