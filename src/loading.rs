//! Counts in-flight asset loads and drives the busy indicator.

use std::cell::Cell;
use std::rc::Rc;

/// The page's loading screen.
pub trait BusyIndicator {
    fn set_busy(&self, busy: bool);
    /// Replaces the indicator content with `message`; stays until reload.
    fn show_error(&self, message: &str);
}

pub const LOAD_ERROR_MESSAGE: &str = "⚠️ Error loading model";

/// Owns the pending-load counter. Shared by `Rc` with every ingestion call.
pub struct LoadingCoordinator {
    pending: Cell<usize>,
    failed: Cell<bool>,
    indicator: Box<dyn BusyIndicator>,
}

impl LoadingCoordinator {
    pub fn new(indicator: Box<dyn BusyIndicator>) -> Rc<Self> {
        Rc::new(Self { pending: Cell::new(0), failed: Cell::new(false), indicator })
    }

    /// Starts a load. The counter goes back down when the ticket drops,
    /// whatever the outcome.
    pub fn begin(self: &Rc<Self>) -> LoadTicket {
        let n = self.pending.get();
        if n == 0 {
            self.indicator.set_busy(true);
        }
        self.pending.set(n + 1);
        LoadTicket { coordinator: Rc::clone(self) }
    }

    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.get() > 0
    }

    /// Whether any load has failed this session.
    pub fn has_failed(&self) -> bool {
        self.failed.get()
    }

    fn finish(&self) {
        let n = self.pending.get().saturating_sub(1);
        self.pending.set(n);
        if n == 0 {
            self.indicator.set_busy(false);
        }
    }
}

/// One pending load. Dropping it releases the count.
#[must_use = "dropping the ticket ends the load immediately"]
pub struct LoadTicket {
    coordinator: Rc<LoadingCoordinator>,
}

impl LoadTicket {
    /// Ends the load as failed: the count is released, then the error
    /// message replaces the indicator content.
    pub fn fail(self) {
        let coordinator = Rc::clone(&self.coordinator);
        drop(self);
        coordinator.failed.set(true);
        coordinator.indicator.show_error(LOAD_ERROR_MESSAGE);
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        self.coordinator.finish();
    }
}
