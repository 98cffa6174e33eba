mod branch_and_bound;
mod dual;
mod error;
mod problem;
mod simplex;
mod solution;
mod standard_form;
mod tableau;

pub use branch_and_bound::{
    BranchAndBoundAction, BranchAndBoundNode, BranchAndBoundStep, BranchAndBoundTrace, BranchDirection, FathomReason,
    Incumbent, NodeId, NodeSolution, NodeStatus,
};
pub use error::ProblemError;
pub use problem::{Constraint, ConstraintOp, IntegerProgram, LinearProgram, VariableRestriction};
pub use simplex::{identity_basis, needs_phase_one, Solver};
pub use solution::{
    Analysis, ConstraintViolation, ReducedCost, SensitivityRange, ShadowPrice, Solution, SolutionStatus, SolverStep,
    SolverTrace, StepStatus,
};
pub use standard_form::{convert_to_standard_form, ColumnKind, StandardForm};
pub use tableau::{Phase, Tableau};
