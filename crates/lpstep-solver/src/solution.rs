use crate::tableau::Tableau;

/// The result of solving an LP problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable
    pub values: Vec<f64>,
    /// Optimal objective value, in the problem's own sense
    pub objective_value: f64,
    /// Detailed analysis
    pub analysis: Analysis,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// The iteration cap was hit before anything was proved
    IterationLimit,
}

/// Detailed analysis of the optimal solution
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Analysis {
    /// Shadow prices (dual values) for each inequality constraint
    /// Indicates how much the objective would change per unit increase of the RHS
    pub shadow_prices: Vec<ShadowPrice>,

    /// Reduced costs for each variable
    /// For non-basic variables, indicates how much the objective coefficient must
    /// improve before the variable enters the solution
    pub reduced_costs: Vec<ReducedCost>,

    /// Which constraints are binding (tight) at optimum
    pub binding_constraints: Vec<String>,

    /// RHS ranges over which the optimal basis stays primal feasible
    pub rhs_sensitivity: Vec<SensitivityRange>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowPrice {
    /// Constraint name
    pub constraint: String,
    /// Shadow price value
    pub value: f64,
    /// Interpretation
    pub interpretation: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedCost {
    /// Variable name
    pub variable: String,
    /// Current value in solution
    pub value: f64,
    /// Reduced cost
    pub reduced_cost: f64,
    /// Is this variable in the basis?
    pub is_basic: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityRange {
    /// Variable or constraint name
    pub name: String,
    /// Current value
    pub current: f64,
    /// Lower bound of range where solution structure stays same
    pub lower_bound: f64,
    /// Upper bound of range where solution structure stays same
    pub upper_bound: f64,
}

/// Information about a violated constraint
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Constraint name
    pub constraint: String,
    /// Required value (from constraint RHS)
    pub required: f64,
    /// Actual value achieved
    pub actual: f64,
    /// How much the constraint is violated by
    pub violation_amount: f64,
    /// Human-readable description of what's wrong
    pub description: String,
}

/// Where a snapshot sits in the solver's state machine
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    StandardForm,
    ArtificialVarsAdded,
    Phase1Start,
    Iteration,
    Phase1Optimal,
    Phase2NonCanonical,
    Phase2Canonical,
    /// RHS values were overwritten ahead of a dual simplex run
    RhsModified,
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}

/// One immutable snapshot of the solver
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolverStep {
    pub tableau: Tableau,
    /// Column entering the basis
    pub entering: Option<usize>,
    /// Column leaving the basis
    pub leaving: Option<usize>,
    /// (row, column) of the pivot element
    pub pivot: Option<(usize, usize)>,
    pub status: StepStatus,
}

/// Ordered step trace plus the terminal result
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolverTrace {
    pub steps: Vec<SolverStep>,
    pub solution: Solution,
}

impl Solution {
    /// No feasible point: the objective is the worst value for the problem's sense
    pub fn infeasible(maximize: bool) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: if maximize { f64::NEG_INFINITY } else { f64::INFINITY },
            analysis: Analysis::empty(),
        }
    }

    pub fn unbounded(maximize: bool) -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value: if maximize { f64::INFINITY } else { f64::NEG_INFINITY },
            analysis: Analysis::empty(),
        }
    }

    pub fn iteration_limit() -> Self {
        Self {
            status: SolutionStatus::IterationLimit,
            values: Vec::new(),
            objective_value: f64::NAN,
            analysis: Analysis::empty(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }
}

impl Analysis {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl SolverStep {
    pub(crate) fn snapshot(tableau: Tableau, status: StepStatus) -> Self {
        Self {
            tableau,
            entering: None,
            leaving: None,
            pivot: None,
            status,
        }
    }

    pub(crate) fn pivoted(tableau: Tableau, row: usize, entering: usize, leaving: usize) -> Self {
        Self {
            tableau,
            entering: Some(entering),
            leaving: Some(leaving),
            pivot: Some((row, entering)),
            status: StepStatus::Iteration,
        }
    }
}

impl SolverTrace {
    /// Tableau of the last step
    pub fn final_tableau(&self) -> Option<&Tableau> {
        self.steps.last().map(|step| &step.tableau)
    }

    pub fn terminal_status(&self) -> Option<StepStatus> {
        self.steps.last().map(|step| step.status)
    }

    /// Number of pivots performed
    pub fn iterations(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Iteration)
            .count()
    }
}
