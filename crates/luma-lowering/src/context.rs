//! Per-file lowering state.
//!
//! One `LoweringContext` exists per source file. It owns:
//! - the lexical scope stack (source name to emitted name)
//! - the prerequisite statement queue
//! - the loop-info and try-region stacks of the function being lowered
//! - the generator-state stack
//! - the type-predeclaration ledger
//!
//! Every stack is balanced by the closure-scoped helpers on `Lowerer`; the
//! raw push/pop methods here assert their own invariants.

use crate::runtime::ControlTransfer;
use luma_common::limits::MAX_IDENTIFIER_DISAMBIGUATION;
use luma_target::ir::is_valid_identifier;
use luma_target::Stmt;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

// =============================================================================
// Scopes
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Local,
    /// A `ref`/`out` parameter: a getter/setter closure.
    RefParameter,
    /// A same-file type declared as a file-level local.
    Type,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub emitted: String,
    pub kind: BindingKind,
}

#[derive(Debug, Default)]
struct ScopeFrame {
    bindings: FxHashMap<String, Binding>,
    /// Every emitted name introduced in this frame, including temporaries.
    emitted: FxHashSet<String>,
}

// =============================================================================
// Control flow bookkeeping
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    Loop,
    Switch,
}

/// One enclosing loop or switch.
#[derive(Clone, Debug)]
pub struct LoopInfo {
    pub kind: LoopKind,
    /// Try depth of the enclosing function when the loop was entered.
    pub try_depth: usize,
    /// The switch chain is wrapped in `repeat ... until true` so a
    /// non-trailing `break` has a native target.
    pub needs_wrapper: bool,
    /// Flag carrying a `continue` out of a wrapped switch.
    pub continue_flag: Option<String>,
}

/// Control transfers that escaped one try-like region.
#[derive(Clone, Debug, Default)]
pub struct TryRegion {
    used: SmallVec<[ControlTransfer; 3]>,
}

impl TryRegion {
    pub fn mark(&mut self, transfer: ControlTransfer) {
        if !self.used.contains(&transfer) {
            self.used.push(transfer);
        }
    }

    pub fn uses(&self, transfer: ControlTransfer) -> bool {
        self.used.contains(&transfer)
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// State of the generator partition being lowered.
#[derive(Clone, Debug)]
pub struct GeneratorState {
    /// Name of the break-signal callback parameter of the partition.
    pub break_callback: String,
    /// Try depth at partition entry; deeper means lowering is inside a
    /// helper closure of the partition.
    pub try_depth: usize,
}

#[derive(Debug, Default)]
struct FunctionFrame {
    loops: Vec<LoopInfo>,
    try_regions: Vec<TryRegion>,
    generators: Vec<GeneratorState>,
}

// =============================================================================
// Predeclaration ledger
// =============================================================================

/// Tracks which same-file types already have their `local` binding.
#[derive(Debug, Default)]
pub struct PredeclarationLedger {
    declared: FxHashSet<String>,
    pending: Vec<String>,
}

impl PredeclarationLedger {
    /// Record a reference to `name`; a forward reference becomes pending.
    pub fn require(&mut self, name: &str) {
        if !self.declared.contains(name) && !self.pending.iter().any(|p| p == name) {
            self.pending.push(name.to_string());
        }
    }

    /// Mark `name` declared by its own declaration. Returns false when a
    /// predeclaration already introduced the binding.
    pub fn declare(&mut self, name: &str) -> bool {
        self.pending.retain(|p| p != name);
        self.declared.insert(name.to_string())
    }

    /// Drain pending forward references as `local T` statements, in
    /// first-reference order.
    pub fn take_pending(&mut self) -> Vec<Stmt> {
        let pending = std::mem::take(&mut self.pending);
        pending
            .into_iter()
            .filter(|name| self.declared.insert(name.clone()))
            .map(|name| Stmt::local(name, None))
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

// =============================================================================
// Context
// =============================================================================

#[derive(Debug)]
pub struct LoweringContext {
    scopes: SmallVec<[ScopeFrame; 8]>,
    prerequisites: Vec<Vec<Stmt>>,
    loops: Vec<LoopInfo>,
    try_regions: Vec<TryRegion>,
    saved_functions: Vec<FunctionFrame>,
    generators: Vec<GeneratorState>,
    /// Same-file types: full name to emitted local name.
    local_types: FxHashMap<String, String>,
    pub ledger: PredeclarationLedger,
}

/// Globals the lowering emits itself; user bindings are renamed around them.
pub const TARGET_GLOBALS: &[&str] = &[
    "table",
    "math",
    "string",
    "setmetatable",
    "select",
    "error",
    "typeof",
    "tostring",
    "tonumber",
    "bit32",
    "print",
    "self",
];

impl LoweringContext {
    pub fn new(runtime_library: &str) -> Self {
        let mut root = ScopeFrame::default();
        root.emitted.insert(runtime_library.to_string());
        for global in TARGET_GLOBALS {
            root.emitted.insert((*global).to_string());
        }
        let mut scopes = SmallVec::new();
        scopes.push(root);
        Self {
            scopes,
            prerequisites: Vec::new(),
            loops: Vec::new(),
            try_regions: Vec::new(),
            saved_functions: Vec::new(),
            generators: Vec::new(),
            local_types: FxHashMap::default(),
            ledger: PredeclarationLedger::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Scopes
    // -------------------------------------------------------------------------

    pub fn push_scope(&mut self) {
        self.scopes.push(ScopeFrame::default());
    }

    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "attempted to pop the root scope");
        self.scopes.pop();
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.scopes.iter().any(|frame| frame.emitted.contains(name))
    }

    /// A name derived from `base` that no active scope has emitted.
    fn allocate(&self, base: &str) -> String {
        let base = sanitize(base);
        if is_valid_identifier(&base) && !self.is_taken(&base) {
            return base;
        }
        for n in 1..=MAX_IDENTIFIER_DISAMBIGUATION {
            let candidate = format!("{base}_{n}");
            if !self.is_taken(&candidate) {
                return candidate;
            }
        }
        panic!("identifier disambiguation exhausted for '{base}'");
    }

    fn top(&mut self) -> &mut ScopeFrame {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Bind source name `name` in the innermost scope to a fresh emitted name.
    pub fn declare(&mut self, name: &str, kind: BindingKind) -> String {
        let emitted = self.allocate(name);
        self.bind(name, emitted.clone(), kind);
        emitted
    }

    /// Bind `name` to an already-chosen emitted name.
    pub fn bind(&mut self, name: &str, emitted: String, kind: BindingKind) {
        let frame = self.top();
        frame.emitted.insert(emitted.clone());
        frame
            .bindings
            .insert(name.to_string(), Binding { emitted, kind });
    }

    /// A compiler temporary: unique, reserved in the innermost scope, and
    /// never reachable by a source name.
    pub fn fresh(&mut self, base: &str) -> String {
        let emitted = self.allocate(base);
        self.top().emitted.insert(emitted.clone());
        emitted
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    pub fn register_local_type(&mut self, full_name: &str, simple_name: &str) -> String {
        let emitted = self.declare(simple_name, BindingKind::Type);
        self.local_types
            .insert(full_name.to_string(), emitted.clone());
        emitted
    }

    pub fn local_type(&self, full_name: &str) -> Option<&str> {
        self.local_types.get(full_name).map(String::as_str)
    }

    // -------------------------------------------------------------------------
    // Prerequisites
    // -------------------------------------------------------------------------

    pub fn begin_capture(&mut self) {
        self.prerequisites.push(Vec::new());
    }

    pub fn end_capture(&mut self) -> Vec<Stmt> {
        let Some(frame) = self.prerequisites.pop() else {
            panic!("prerequisite capture ended without a frame");
        };
        if !frame.is_empty() {
            tracing::trace!(count = frame.len(), "[lowering] flushing prerequisites");
        }
        frame
    }

    pub fn push_prerequisite(&mut self, stmt: Stmt) {
        let Some(frame) = self.prerequisites.last_mut() else {
            panic!("prerequisite emitted outside of a statement builder");
        };
        frame.push(stmt);
    }

    // -------------------------------------------------------------------------
    // Loops and try regions
    // -------------------------------------------------------------------------

    pub fn push_loop(&mut self, kind: LoopKind, needs_wrapper: bool) {
        self.loops.push(LoopInfo {
            kind,
            try_depth: self.try_regions.len(),
            needs_wrapper,
            continue_flag: None,
        });
    }

    pub fn pop_loop(&mut self) -> LoopInfo {
        let Some(info) = self.loops.pop() else {
            panic!("loop stack underflow");
        };
        info
    }

    /// Innermost loop or switch (a `break` target).
    pub fn innermost_breakable(&self) -> Option<&LoopInfo> {
        self.loops.last()
    }

    /// Index of the innermost real loop (a `continue` target).
    pub fn innermost_loop_index(&self) -> Option<usize> {
        self.loops.iter().rposition(|l| l.kind == LoopKind::Loop)
    }

    pub fn loop_at(&self, index: usize) -> &LoopInfo {
        &self.loops[index]
    }

    pub fn loop_at_mut(&mut self, index: usize) -> &mut LoopInfo {
        &mut self.loops[index]
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    pub fn enter_try(&mut self) {
        self.try_regions.push(TryRegion::default());
    }

    pub fn exit_try(&mut self) -> TryRegion {
        let Some(region) = self.try_regions.pop() else {
            panic!("try region stack underflow");
        };
        region
    }

    pub fn try_depth(&self) -> usize {
        self.try_regions.len()
    }

    pub fn mark_transfer(&mut self, transfer: ControlTransfer) {
        let Some(region) = self.try_regions.last_mut() else {
            panic!("sentinel transfer outside of a try region");
        };
        region.mark(transfer);
    }

    /// Start a new function body: loops, try regions and generator
    /// partitions of the enclosing function are not reachable from inside it.
    pub fn enter_function(&mut self) {
        self.saved_functions.push(FunctionFrame {
            loops: std::mem::take(&mut self.loops),
            try_regions: std::mem::take(&mut self.try_regions),
            generators: std::mem::take(&mut self.generators),
        });
    }

    pub fn exit_function(&mut self) {
        let Some(frame) = self.saved_functions.pop() else {
            panic!("function context stack underflow");
        };
        debug_assert!(self.loops.is_empty(), "loop left open at function exit");
        debug_assert!(self.try_regions.is_empty(), "try region left open at function exit");
        debug_assert!(self.generators.is_empty(), "generator left open at function exit");
        self.loops = frame.loops;
        self.try_regions = frame.try_regions;
        self.generators = frame.generators;
    }

    // -------------------------------------------------------------------------
    // Generators
    // -------------------------------------------------------------------------

    pub fn push_generator(&mut self, break_callback: String) {
        self.generators.push(GeneratorState {
            break_callback,
            try_depth: self.try_regions.len(),
        });
    }

    pub fn pop_generator(&mut self) {
        assert!(self.generators.pop().is_some(), "generator stack underflow");
    }

    pub fn current_generator(&self) -> Option<&GeneratorState> {
        self.generators.last()
    }

    /// Whether lowering sits inside a helper closure of the current
    /// generator partition.
    pub fn in_generator_helper(&self) -> bool {
        self.generators
            .last()
            .is_some_and(|g| self.try_regions.len() > g.try_depth)
    }

    // -------------------------------------------------------------------------
    // File end
    // -------------------------------------------------------------------------

    /// Every stack back at its file-level state.
    pub fn assert_balanced(&self) {
        assert_eq!(self.scopes.len(), 1, "scope stack unbalanced at end of file");
        assert!(self.prerequisites.is_empty(), "prerequisite queue not drained");
        assert!(self.loops.is_empty(), "loop stack unbalanced at end of file");
        assert!(self.try_regions.is_empty(), "try stack unbalanced at end of file");
        assert!(self.saved_functions.is_empty(), "function stack unbalanced");
        assert!(self.generators.is_empty(), "generator stack unbalanced");
    }
}

fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowed_names_are_disambiguated() {
        let mut ctx = LoweringContext::new("CS");
        let outer = ctx.declare("x", BindingKind::Local);
        ctx.push_scope();
        let inner = ctx.declare("x", BindingKind::Local);
        assert_eq!(outer, "x");
        assert_eq!(inner, "x_1");
        assert_eq!(ctx.lookup("x").map(|b| b.emitted.as_str()), Some("x_1"));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("x").map(|b| b.emitted.as_str()), Some("x"));
    }

    #[test]
    fn test_sibling_scopes_may_reuse_names() {
        let mut ctx = LoweringContext::new("CS");
        ctx.push_scope();
        let first = ctx.fresh("_temp");
        ctx.pop_scope();
        ctx.push_scope();
        let second = ctx.fresh("_temp");
        ctx.pop_scope();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeded_globals_are_never_user_names() {
        let mut ctx = LoweringContext::new("CS");
        assert_eq!(ctx.declare("table", BindingKind::Local), "table_1");
        assert_eq!(ctx.declare("CS", BindingKind::Local), "CS_1");
        assert_eq!(ctx.declare("end", BindingKind::Local), "end_1");
    }

    #[test]
    fn test_ledger_emits_forward_reference_once() {
        let mut ledger = PredeclarationLedger::default();
        ledger.require("B");
        ledger.require("B");
        let stmts = ledger.take_pending();
        assert_eq!(stmts, vec![Stmt::local("B", None)]);
        assert!(!ledger.declare("B"));
        ledger.require("B");
        assert!(!ledger.has_pending());
    }

    #[test]
    #[should_panic(expected = "root scope")]
    fn test_popping_root_scope_is_an_invariant_violation() {
        let mut ctx = LoweringContext::new("CS");
        ctx.pop_scope();
    }
}
