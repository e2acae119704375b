//! Names the lowered code uses from the runtime library table.
//!
//! The runtime itself ships separately; lowering only references it through
//! these names so the table can be renamed with `runtimeLibrary`.

use luma_target::{Expr, Stmt};

/// A non-local control transfer carried out of a synthesized closure as a
/// tagged return `(tag, payload)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlTransfer {
    Break,
    Continue,
    Return,
}

impl ControlTransfer {
    pub const ALL: [ControlTransfer; 3] = [
        ControlTransfer::Break,
        ControlTransfer::Continue,
        ControlTransfer::Return,
    ];

    /// Field of the runtime table holding the sentinel value.
    pub fn tag(self) -> &'static str {
        match self {
            ControlTransfer::Break => "TRY_BREAK",
            ControlTransfer::Continue => "TRY_CONTINUE",
            ControlTransfer::Return => "TRY_RETURN",
        }
    }
}

pub const TRY: &str = "try";
pub const THROW: &str = "throw";
pub const IS: &str = "is";
pub const AS: &str = "as";
pub const ASYNC: &str = "async";
pub const AWAIT: &str = "await";
pub const ENUMERATOR: &str = "Enumerator";
pub const ENUMERATOR_NEW: &str = "Enumerator.new";
pub const GET_ASSEMBLY_TYPE: &str = "getAssemblyType";
pub const DEFAULT_VALUE: &str = "defaultValue";
pub const SIGNAL_NEW: &str = "Signal.new";
pub const REGISTER_TYPE: &str = "Reflection.registerType";

/// Expression builders over the runtime table.
#[derive(Clone, Debug)]
pub struct Runtime {
    name: String,
}

impl Runtime {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `CS.<path>` for a dotted path.
    pub fn member(&self, path: &str) -> Expr {
        path.split('.')
            .fold(Expr::id(self.name.clone()), |acc, part| Expr::member(acc, part))
    }

    /// `CS.<path>(args)`
    pub fn call(&self, path: &str, args: Vec<Expr>) -> Expr {
        Expr::call(self.member(path), args)
    }

    pub fn tag(&self, transfer: ControlTransfer) -> Expr {
        self.member(transfer.tag())
    }

    /// `return CS.TRY_<X>, payload`
    pub fn tagged_return(&self, transfer: ControlTransfer, payload: Expr) -> Stmt {
        Stmt::Return(vec![self.tag(transfer), payload])
    }

    pub fn throw(&self, value: Expr) -> Expr {
        self.call(THROW, vec![value])
    }

    pub fn is(&self, value: Expr, ty: Expr) -> Expr {
        self.call(IS, vec![value, ty])
    }

    pub fn assembly_type(&self, full_name: &str) -> Expr {
        self.call(GET_ASSEMBLY_TYPE, vec![Expr::string(full_name)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luma_target::print_expr;

    #[test]
    fn test_tags_are_distinct_runtime_fields() {
        let runtime = Runtime::new("CS");
        let printed: Vec<String> = ControlTransfer::ALL
            .iter()
            .map(|t| print_expr(&runtime.tag(*t)))
            .collect();
        assert_eq!(printed, ["CS.TRY_BREAK", "CS.TRY_CONTINUE", "CS.TRY_RETURN"]);
    }

    #[test]
    fn test_renamed_runtime_library() {
        let runtime = Runtime::new("Rt");
        assert_eq!(
            print_expr(&runtime.call("Enumerator.new", vec![Expr::empty_table()])),
            "Rt.Enumerator.new({})"
        );
    }
}
