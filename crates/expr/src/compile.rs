//! # Compilation to numeric programs
//!
//! Lowers an [`Expr`] tree into a flat evaluation program:
//!
//! 1. **Hash-consing**: structurally identical subtrees become one node in
//!    a directed acyclic graph, so `(x + y) * (x + y)` computes `x + y`
//!    once.
//! 2. **Topological ordering** ([`petgraph::algo::toposort`]): operands
//!    are scheduled before their users.
//! 3. **Flattening**: the ordered nodes become a step list evaluated over
//!    a scratch buffer of slots.
//!
//! Compilation resolves every variable against a fixed, ordered name list;
//! an unknown name fails here, which is why evaluation itself is
//! infallible. Compiled programs are immutable, cached process-wide by
//! structural equality, and shared across evaluators with [`Arc`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::ast::{BinOp, Expr, UnFn};
use crate::error::ExprError;

/// One evaluation step. Operand indices refer to earlier steps.
#[derive(Debug, Clone)]
enum Step {
    Const(f64),
    Load(usize),
    Unary(UnFn, usize),
    Binary(BinOp, usize, usize),
}

/// A flattened shared-subexpression program over an ordered variable list.
#[derive(Debug)]
pub struct Program {
    steps: Vec<Step>,
    out: usize,
    vars: Vec<String>,
}

impl Program {
    /// Number of evaluation steps (after subexpression sharing).
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The variable order the program was compiled against.
    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    fn run(&self, values: &[f64], scratch: &mut Vec<f64>) -> f64 {
        debug_assert_eq!(values.len(), self.vars.len());
        scratch.clear();
        scratch.reserve(self.steps.len());
        for step in &self.steps {
            let v = match *step {
                Step::Const(c) => c,
                Step::Load(i) => values[i],
                Step::Unary(f, a) => f.apply(scratch[a]),
                Step::Binary(op, a, b) => op.apply(scratch[a], scratch[b]),
            };
            scratch.push(v);
        }
        scratch[self.out]
    }
}

/// A pure numeric evaluator for one compiled expression.
///
/// Cloning is cheap; clones share the underlying [`Program`].
#[derive(Debug, Clone)]
pub struct Evaluator {
    program: Arc<Program>,
}

impl Evaluator {
    /// Evaluate against values aligned with the compiled variable order.
    ///
    /// `values.len()` must equal `vars().len()`.
    pub fn eval(&self, values: &[f64]) -> f64 {
        let mut scratch = Vec::new();
        self.program.run(values, &mut scratch)
    }

    /// Evaluate reusing a caller-owned scratch buffer. Intended for hot
    /// loops that run many evaluators over one bound value buffer.
    pub fn eval_into(&self, values: &[f64], scratch: &mut Vec<f64>) -> f64 {
        self.program.run(values, scratch)
    }

    /// The variable order this evaluator expects.
    pub fn vars(&self) -> &[String] {
        self.program.vars()
    }

    /// Number of evaluation steps.
    pub fn steps(&self) -> usize {
        self.program.len()
    }

    /// True if both evaluators share one cached program.
    pub fn shares_program_with(&self, other: &Evaluator) -> bool {
        Arc::ptr_eq(&self.program, &other.program)
    }
}

// ============================================================================
// Lowering
// ============================================================================

/// Graph node: the operation, with operand order kept alongside (edges
/// carry only the dependency structure for the topological sort).
#[derive(Debug)]
struct Node {
    op: NodeOp,
    args: Vec<NodeIndex>,
}

#[derive(Debug)]
enum NodeOp {
    Const(f64),
    Load(usize),
    Unary(UnFn),
    Binary(BinOp),
}

/// Hash-consing key: operation plus operand node identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Const(u64),
    Load(usize),
    Unary(UnFn, NodeIndex),
    Binary(BinOp, NodeIndex, NodeIndex),
}

struct Lowerer<'a> {
    graph: DiGraph<Node, ()>,
    memo: HashMap<NodeKey, NodeIndex>,
    var_index: HashMap<&'a str, usize>,
}

impl<'a> Lowerer<'a> {
    fn new(vars: &'a [String]) -> Result<Self, ExprError> {
        let mut var_index = HashMap::with_capacity(vars.len());
        for (i, name) in vars.iter().enumerate() {
            if var_index.insert(name.as_str(), i).is_some() {
                return Err(ExprError::DuplicateVariable { name: name.clone() });
            }
        }
        Ok(Self {
            graph: DiGraph::new(),
            memo: HashMap::new(),
            var_index,
        })
    }

    fn intern(&mut self, expr: &Expr) -> Result<NodeIndex, ExprError> {
        let (key, op, args) = match expr {
            Expr::Const(v) => (NodeKey::Const(v.to_bits()), NodeOp::Const(*v), vec![]),
            Expr::Var(name) => {
                let index = *self.var_index.get(name.as_str()).ok_or_else(|| {
                    ExprError::UnresolvedSymbol { name: name.clone() }
                })?;
                (NodeKey::Load(index), NodeOp::Load(index), vec![])
            }
            Expr::Unary(f, a) => {
                let a = self.intern(a)?;
                (NodeKey::Unary(*f, a), NodeOp::Unary(*f), vec![a])
            }
            Expr::Binary(binop, l, r) => {
                let l = self.intern(l)?;
                let r = self.intern(r)?;
                (NodeKey::Binary(*binop, l, r), NodeOp::Binary(*binop), vec![l, r])
            }
        };

        if let Some(&existing) = self.memo.get(&key) {
            return Ok(existing);
        }
        let node = self.graph.add_node(Node { op, args: args.clone() });
        for arg in args {
            self.graph.add_edge(arg, node, ());
        }
        self.memo.insert(key, node);
        Ok(node)
    }

    fn flatten(self, root: NodeIndex, vars: &[String]) -> Result<Program, ExprError> {
        let order = toposort(&self.graph, None).map_err(|_| ExprError::Cycle)?;

        let mut position = vec![0usize; self.graph.node_count()];
        let mut steps = Vec::with_capacity(order.len());
        for (slot, index) in order.iter().enumerate() {
            position[index.index()] = slot;
            let node = &self.graph[*index];
            let step = match node.op {
                NodeOp::Const(v) => Step::Const(v),
                NodeOp::Load(i) => Step::Load(i),
                NodeOp::Unary(f) => Step::Unary(f, position[node.args[0].index()]),
                NodeOp::Binary(binop) => Step::Binary(
                    binop,
                    position[node.args[0].index()],
                    position[node.args[1].index()],
                ),
            };
            steps.push(step);
        }

        Ok(Program {
            steps,
            out: position[root.index()],
            vars: vars.to_vec(),
        })
    }
}

// ============================================================================
// Entry point and program cache
// ============================================================================

#[derive(PartialEq, Eq, Hash)]
struct CacheKey {
    expr: Expr,
    vars: Vec<String>,
}

fn program_cache() -> &'static Mutex<HashMap<CacheKey, Arc<Program>>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, Arc<Program>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_cache() -> std::sync::MutexGuard<'static, HashMap<CacheKey, Arc<Program>>> {
    program_cache()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Compile an expression against an ordered variable list.
///
/// Repeated compilation of a structurally identical expression with the
/// same variable order returns the cached program; training recompiles
/// nothing.
///
/// # Errors
///
/// - [`ExprError::UnresolvedSymbol`] if the expression mentions a name
///   outside `vars`.
/// - [`ExprError::DuplicateVariable`] if `vars` binds a name twice.
pub fn compile(expr: &Expr, vars: &[String]) -> Result<Evaluator, ExprError> {
    {
        let cache = lock_cache();
        if let Some(program) = cache.get(&CacheKey {
            expr: expr.clone(),
            vars: vars.to_vec(),
        }) {
            return Ok(Evaluator {
                program: program.clone(),
            });
        }
    }

    let mut lowerer = Lowerer::new(vars)?;
    let root = lowerer.intern(expr)?;
    let program = Arc::new(lowerer.flatten(root, vars)?);

    let mut cache = lock_cache();
    let entry = cache
        .entry(CacheKey {
            expr: expr.clone(),
            vars: vars.to_vec(),
        })
        .or_insert(program);
    Ok(Evaluator {
        program: entry.clone(),
    })
}

// ============================================================================
// Tests
// ============================================================================
