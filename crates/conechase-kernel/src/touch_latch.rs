//! [`TouchLatch`] – edge-triggered touch flag.

/// Set by the first `true` touch reading of a run and never cleared.
///
/// A fresh latch is created for every run, so there is no reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TouchLatch {
    set: bool,
}

impl TouchLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self) {
        self.set = true;
    }

    /// Feed a raw touch reading; only `true` latches.
    ///
    /// Returns `true` when this reading set a previously clear latch.
    pub fn record(&mut self, touched: bool) -> bool {
        let rising = touched && !self.set;
        if touched {
            self.set();
        }
        rising
    }

    pub fn is_set(&self) -> bool {
        self.set
    }
}
