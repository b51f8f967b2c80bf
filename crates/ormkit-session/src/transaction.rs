//! Declarative transaction scopes.
//!
//! A scope is declared up front with a propagation rule and an outcome,
//! and a [`TransactionToken`] marks its extent. Ending the token applies
//! the declared outcome; dropping it without ending rolls the scope back.
//! Scopes nest: a joined scope shares the open transaction, a nested
//! "requires new" scope runs on a savepoint so it can roll back alone.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ormkit_core::{Provider, Result};

/// How a declared scope relates to an already open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Join the open transaction, or start one when none is open.
    Require,
    /// Always get a fresh scope; nested, this runs on a savepoint.
    RequiresNew,
}

/// The outcome a scope applies when it ends normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Commit,
    Rollback,
}

/// Lock a mutex, adopting the data after a poisoning panic.
///
/// The guarded state stays coherent through panics because every mutation
/// completes before the guard drops; recovering beats propagating the
/// poison into unrelated sessions.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub(crate) enum FrameKind {
    /// The outermost scope; ends with COMMIT or ROLLBACK.
    Root,
    /// A nested "requires new" scope backed by a named savepoint.
    Savepoint(String),
    /// A scope joined onto an already open transaction.
    Joined,
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) kind: FrameKind,
    pub(crate) disposition: Disposition,
    /// Forces rollback at close; set by errors inside the scope and by
    /// rolled-back joined children.
    pub(crate) poisoned: bool,
}

/// Open scopes of one session, innermost last.
#[derive(Debug, Default)]
pub(crate) struct TransactionStack {
    pub(crate) frames: Vec<Frame>,
    savepoints: u64,
}

impl TransactionStack {
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Mark the innermost scope as rollback-only. No-op outside a scope.
    pub(crate) fn poison_current(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.poisoned = true;
        }
    }

    pub(crate) fn next_savepoint(&mut self) -> String {
        self.savepoints += 1;
        format!("sp_{}", self.savepoints)
    }
}

/// Handle for a declared transaction scope.
///
/// The token is decoupled from the session borrow, so statements can run
/// inside the scope. Call [`TransactionToken::end`] to apply the declared
/// disposition; a token that merely goes out of scope rolls back instead,
/// whatever was declared.
#[must_use = "an unended token rolls its scope back on drop"]
pub struct TransactionToken<P: Provider> {
    provider: Arc<Mutex<P>>,
    stack: Arc<Mutex<TransactionStack>>,
    frame: usize,
    done: bool,
}

impl<P: Provider> TransactionToken<P> {
    pub(crate) fn new(
        provider: Arc<Mutex<P>>,
        stack: Arc<Mutex<TransactionStack>>,
        frame: usize,
    ) -> Self {
        Self {
            provider,
            stack,
            frame,
            done: false,
        }
    }

    /// Close the scope, applying its declared disposition.
    ///
    /// Scopes declared inside this one and never ended are closed first,
    /// with a forced rollback. A scope poisoned by an error also rolls
    /// back regardless of its declared disposition.
    pub fn end(mut self) -> Result<()> {
        self.done = true;
        self.finalize(false)
    }

    fn finalize(&self, forced: bool) -> Result<()> {
        let mut stack = lock(&self.stack);
        let mut provider = lock(&self.provider);
        if stack.frames.len() <= self.frame {
            // An enclosing token already drained this scope.
            return Ok(());
        }
        let mut first_error = None;
        while stack.frames.len() > self.frame {
            let abandoned = stack.frames.len() > self.frame + 1;
            let Some(frame) = stack.frames.pop() else {
                break;
            };
            let closed = close_frame(&mut *provider, &mut stack.frames, frame, forced || abandoned);
            if let Err(error) = closed {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<P: Provider> Drop for TransactionToken<P> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(error) = self.finalize(true) {
            tracing::error!(%error, "transaction scope rollback failed on drop");
        }
    }
}

fn close_frame<P: Provider>(
    provider: &mut P,
    frames: &mut Vec<Frame>,
    frame: Frame,
    forced: bool,
) -> Result<()> {
    let rollback = forced || frame.poisoned || frame.disposition == Disposition::Rollback;
    match frame.kind {
        FrameKind::Root => {
            if rollback {
                provider.rollback_transaction()
            } else {
                provider.commit_transaction()
            }
        }
        FrameKind::Savepoint(name) => {
            if rollback {
                provider.rollback_to_savepoint(&name)?;
            }
            provider.release_savepoint(&name)
        }
        FrameKind::Joined => {
            if rollback {
                // The joined scope has no statements of its own to undo;
                // its rollback escalates to the enclosing scope.
                if let Some(parent) = frames.last_mut() {
                    parent.poisoned = true;
                }
            }
            Ok(())
        }
    }
}
