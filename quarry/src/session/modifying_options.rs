/// How a set-based update or delete treats the unit of work around it.
///
/// The statement runs directly against the store. Entities the unit of
/// work already manages keep their old field values until they are
/// refreshed or the context is cleared.
///
/// # Examples
///
/// ```rust,ignore
/// let options = ModifyingOptions::default().clear_automatically(true);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyingOptions {
    flush_automatically: bool,
    clear_automatically: bool,
}

impl Default for ModifyingOptions {
    fn default() -> Self {
        ModifyingOptions {
            flush_automatically: true,
            clear_automatically: false,
        }
    }
}

impl ModifyingOptions {
    pub fn new(flush_automatically: bool, clear_automatically: bool) -> Self {
        ModifyingOptions {
            flush_automatically,
            clear_automatically,
        }
    }

    /// Flush staged writes before the statement runs.
    pub fn flush_automatically(mut self, flush: bool) -> Self {
        self.flush_automatically = flush;
        self
    }

    /// Clear the unit of work after the statement runs, detaching every
    /// managed entity so later reads go to the store.
    pub fn clear_automatically(mut self, clear: bool) -> Self {
        self.clear_automatically = clear;
        self
    }

    pub fn is_flush_automatically(&self) -> bool {
        self.flush_automatically
    }

    pub fn is_clear_automatically(&self) -> bool {
        self.clear_automatically
    }
}
