//! The ownership contract between the acceptor and the worker pool.
//!
//! `offer` takes the handle by value. On `Ok(())` the receiver owns it and is
//! responsible for closing it; the caller can no longer name it. On `Err` the
//! handle comes back untouched inside `Rejected`, and the caller must close
//! it. There is no third outcome.

/// Something that accepts connection handles for processing.
pub trait HandOff<H> {
    /// Offer `handle` for processing.
    ///
    /// May block briefly on internal bookkeeping, never on the processing
    /// of the handle itself.
    fn offer(&self, handle: H) -> Result<(), Rejected<H>>;
}

/// A refused hand-off. Carries the handle back to its owner.
#[derive(Debug)]
pub struct Rejected<H> {
    handle: H,
}

impl<H> Rejected<H> {
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    /// Take back ownership of the handle.
    pub fn into_inner(self) -> H {
        self.handle
    }
}

impl<H> std::fmt::Display for Rejected<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no idle worker available")
    }
}

impl<H: std::fmt::Debug> std::error::Error for Rejected<H> {}
