//! Async functions.
//!
//! An async body is lowered exactly like a synchronous one; the resulting
//! function literal is handed to the runtime's async bridge, which runs it
//! as a coroutine and returns a task. `await` yields to the bridge.

use crate::lowerer::Lowerer;
use crate::runtime::{ASYNC, AWAIT};
use luma_target::{Expr, FunctionBody};

impl Lowerer<'_> {
    /// `CS.async(function(...) ... end)`
    pub(crate) fn async_function(&self, function: FunctionBody) -> Expr {
        self.runtime
            .call(ASYNC, vec![Expr::Function(Box::new(function))])
    }

    /// `CS.await(task)`
    pub(crate) fn lower_await(&self, task: Expr) -> Expr {
        self.runtime.call(AWAIT, vec![task])
    }
}
