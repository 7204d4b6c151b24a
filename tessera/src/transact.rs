use std::fmt::Debug;

/// Consuming two-phase completion.
///
/// A transaction either commits, producing its output, or aborts, discarding
/// any partial work. Implementors must also abort when dropped without being
/// committed.
pub trait Transact: Sized {
    type Output;
    type Error: Debug;

    fn commit(self) -> Result<Self::Output, Self::Error>;

    /// Runs a function against the transaction and commits only if it
    /// succeeds.
    ///
    /// If the function fails, then the transaction is aborted and the error is
    /// returned. Errors from the commit itself are converted into the error
    /// type of the function.
    fn commit_with<F, U, E>(mut self, f: F) -> Result<(Self::Output, U), E>
    where
        F: FnOnce(&mut Self) -> Result<U, E>,
        E: From<Self::Error>,
    {
        match f(&mut self) {
            Ok(value) => self
                .commit()
                .map(|output| (output, value))
                .map_err(E::from),
            Err(error) => {
                self.abort();
                Err(error)
            }
        }
    }

    fn abort(self) {}
}
