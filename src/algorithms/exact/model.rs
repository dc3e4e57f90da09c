// Solver-agnostic binary integer program: typed variables, one record per constraint

use crate::models::{AisleId, CircuitId, OrderId, ProductId, RackId};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::io::{self, Write};

const TOLERANCE: f64 = 1e-6;
const TERMS_PER_LINE: usize = 8;

/// Node of an order's route: the start boundary, a stop, or the end boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Start,
    Stop(usize),
    End,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Start => write!(f, "s"),
            Node::Stop(index) => write!(f, "{}", index),
            Node::End => write!(f, "e"),
        }
    }
}

/// Identity of a binary decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKey {
    /// Product placed in rack
    Assign { product: ProductId, rack: RackId },
    /// Circuit has its window over the rack
    FamilyUses { circuit: CircuitId, rack: RackId },
    /// Circuit window starts at the rack
    FamilyStart { circuit: CircuitId, rack: RackId },
    /// Circuit window ends at the rack
    FamilyEnd { circuit: CircuitId, rack: RackId },
    /// Order picks at least one product at the stop
    Visits { order: OrderId, stop: usize },
    /// Order's route walks directly from one node to the next
    Segment { order: OrderId, from: Node, to: Node },
}

impl VarKey {
    /// LP-safe variable name
    pub fn name(&self) -> String {
        match *self {
            VarKey::Assign { product, rack } => format!("x_{}_{}", product, rack),
            VarKey::FamilyUses { circuit, rack } => format!("y_{}_{}", circuit, rack),
            VarKey::FamilyStart { circuit, rack } => format!("a_{}_{}", circuit, rack),
            VarKey::FamilyEnd { circuit, rack } => format!("b_{}_{}", circuit, rack),
            VarKey::Visits { order, stop } => format!("v_{}_{}", order, stop),
            VarKey::Segment { order, from, to } => format!("z_{}_{}_{}", order, from, to),
        }
    }
}

/// Index of a variable inside a [`Model`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// What a constraint enforces, with the indices it was generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    AssignOnce { product: ProductId },
    RackCapacity { rack: RackId },
    AisleAeration { aisle: AisleId },
    UsesLink { product: ProductId, rack: RackId },
    OneStart { circuit: CircuitId },
    OneEnd { circuit: CircuitId },
    WindowOrder { circuit: CircuitId },
    NotBeforeStart { circuit: CircuitId, rack: RackId },
    NotAfterEnd { circuit: CircuitId, rack: RackId },
    InsideWindow { circuit: CircuitId, rack: RackId },
    /// At most one window spans the gap right after `rack`
    EdgeCover { rack: RackId },
    /// No other circuit uses a rack this circuit's window passes through
    PassThrough { circuit: CircuitId, rack: RackId },
    VisitLink { order: OrderId, product: ProductId, rack: RackId },
    VisitUpper { order: OrderId, stop: usize },
    LeaveStart { order: OrderId },
    EnterEnd { order: OrderId },
    FlowIn { order: OrderId, stop: usize },
    FlowOut { order: OrderId, stop: usize },
}

impl ConstraintKind {
    /// LP-safe constraint name
    pub fn name(&self) -> String {
        match *self {
            ConstraintKind::AssignOnce { product } => format!("assign_{}", product),
            ConstraintKind::RackCapacity { rack } => format!("cap_{}", rack),
            ConstraintKind::AisleAeration { aisle } => format!("aer_{}", aisle),
            ConstraintKind::UsesLink { product, rack } => format!("use_{}_{}", product, rack),
            ConstraintKind::OneStart { circuit } => format!("start_{}", circuit),
            ConstraintKind::OneEnd { circuit } => format!("end_{}", circuit),
            ConstraintKind::WindowOrder { circuit } => format!("order_{}", circuit),
            ConstraintKind::NotBeforeStart { circuit, rack } => format!("after_{}_{}", circuit, rack),
            ConstraintKind::NotAfterEnd { circuit, rack } => format!("before_{}_{}", circuit, rack),
            ConstraintKind::InsideWindow { circuit, rack } => format!("inside_{}_{}", circuit, rack),
            ConstraintKind::EdgeCover { rack } => format!("edge_{}", rack),
            ConstraintKind::PassThrough { circuit, rack } => format!("pass_{}_{}", circuit, rack),
            ConstraintKind::VisitLink {
                order,
                product,
                rack,
            } => format!("visit_{}_{}_{}", order, product, rack),
            ConstraintKind::VisitUpper { order, stop } => format!("visitub_{}_{}", order, stop),
            ConstraintKind::LeaveStart { order } => format!("leave_{}", order),
            ConstraintKind::EnterEnd { order } => format!("enter_{}", order),
            ConstraintKind::FlowIn { order, stop } => format!("in_{}_{}", order, stop),
            ConstraintKind::FlowOut { order, stop } => format!("out_{}_{}", order, stop),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    fn symbol(&self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }
}

/// Sum of `coefficient * variable` terms
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn add(&mut self, var: VarId, coefficient: f64) -> &mut Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn with(mut self, var: VarId, coefficient: f64) -> Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression under a full valuation of the model
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(var, c)| c * values[var.0]).sum()
    }
}

/// One materialised constraint: `expr sense rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64]) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + TOLERANCE,
            Sense::Ge => lhs >= self.rhs - TOLERANCE,
            Sense::Eq => (lhs - self.rhs).abs() <= TOLERANCE,
        }
    }
}

/// Outcome of plugging a valuation into a model
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub objective: f64,
    pub violated: Vec<ConstraintKind>,
}

impl Evaluation {
    pub fn is_feasible(&self) -> bool {
        self.violated.is_empty()
    }
}

/// A minimisation problem over binary variables
#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    variables: Vec<VarKey>,
    index: HashMap<VarKey, VarId>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
}

impl Model {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a binary variable, or returns the existing one with the same key
    pub fn add_binary(&mut self, key: VarKey) -> VarId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = VarId(self.variables.len());
        self.variables.push(key);
        self.index.insert(key, id);
        id
    }

    /// Looks a variable up by key
    pub fn var(&self, key: &VarKey) -> Option<VarId> {
        self.index.get(key).copied()
    }

    pub fn key(&self, var: VarId) -> VarKey {
        self.variables[var.0]
    }

    pub fn add_constraint(&mut self, kind: ConstraintKind, expr: LinearExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            kind,
            expr,
            sense,
            rhs,
        });
    }

    /// Adds `coefficient * var` to the minimised objective
    pub fn add_objective_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.objective.add(var, coefficient);
        }
    }

    pub fn variables(&self) -> &[VarKey] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value and violated constraints under `values`, which holds
    /// one entry per variable in [`VarId`] order
    pub fn evaluate(&self, values: &[f64]) -> Evaluation {
        assert_eq!(
            values.len(),
            self.variables.len(),
            "valuation size does not match the model"
        );
        Evaluation {
            objective: self.objective.evaluate(values),
            violated: self
                .constraints
                .iter()
                .filter(|c| !c.is_satisfied(values))
                .map(|c| c.kind)
                .collect(),
        }
    }

    /// Writes the model in CPLEX LP format
    pub fn write_lp<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.to_lp_string().as_bytes())?;
        writer.flush()
    }

    /// Renders the model in CPLEX LP format
    pub fn to_lp_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\\ Model {}", self.name);
        let _ = writeln!(
            out,
            "\\ {} binary variables, {} constraints",
            self.num_variables(),
            self.num_constraints()
        );
        out.push_str("Minimize\n obj:");
        self.push_terms(&mut out, &self.objective);
        out.push_str("\nSubject To\n");
        for constraint in &self.constraints {
            let _ = write!(out, " {}:", constraint.kind.name());
            self.push_terms(&mut out, &constraint.expr);
            let _ = writeln!(out, " {} {}", constraint.sense.symbol(), constraint.rhs);
        }
        out.push_str("Binary\n");
        for key in &self.variables {
            let _ = writeln!(out, " {}", key.name());
        }
        out.push_str("End\n");
        out
    }

    fn push_terms(&self, out: &mut String, expr: &LinearExpr) {
        if expr.is_empty() {
            // LP needs at least one term on every row
            if let Some(first) = self.variables.first() {
                let _ = write!(out, " 0 {}", first.name());
            }
            return;
        }
        for (position, &(var, coefficient)) in expr.terms.iter().enumerate() {
            if position > 0 && position % TERMS_PER_LINE == 0 {
                out.push_str("\n   ");
            }
            let sign = if coefficient < 0.0 { '-' } else { '+' };
            let _ = write!(
                out,
                " {} {} {}",
                sign,
                coefficient.abs(),
                self.variables[var.0].name()
            );
        }
    }
}
