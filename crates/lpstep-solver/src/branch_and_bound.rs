//! Branch-and-bound search over LP relaxations.

use std::fmt;

use crate::error::ProblemError;
use crate::problem::{ConstraintOp, IntegerProgram, LinearProgram};
use crate::simplex::Solver;
use crate::solution::SolutionStatus;

/// Index of a node in the tree arena
pub type NodeId = usize;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDirection {
    /// x <= floor(value)
    Down,
    /// x >= ceil(value)
    Up,
}

/// Status of a search node.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Node is waiting to be processed.
    Active,
    /// Node was closed without branching.
    Fathomed,
    /// Node was branched (children created).
    Branched,
    /// Node produced an integer-feasible solution.
    Integer,
}

/// Why a node was fathomed
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FathomReason {
    /// The relaxation has no feasible point
    Infeasible,
    /// The relaxation cannot beat the incumbent
    Bounded,
    /// The relaxation is unbounded
    Unbounded,
    /// The relaxation hit the simplex iteration limit
    IterationLimit,
}

impl fmt::Display for FathomReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FathomReason::Infeasible => write!(f, "infeasible"),
            FathomReason::Bounded => write!(f, "bounded"),
            FathomReason::Unbounded => write!(f, "unbounded"),
            FathomReason::IterationLimit => write!(f, "iteration limit"),
        }
    }
}

/// LP relaxation result attached to a node
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSolution {
    pub values: Vec<f64>,
    pub objective_value: f64,
    pub feasible: bool,
}

/// A node in the B&B search tree.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BranchAndBoundNode {
    pub id: NodeId,
    /// Parent node ID (None for root).
    pub parent_id: Option<NodeId>,
    /// Relaxation: the root problem plus every branch bound on the path here.
    pub problem: LinearProgram,
    pub solution: Option<NodeSolution>,
    /// Optimistic objective bound. Inherited from the parent until solved.
    pub bound: f64,
    /// Depth in the tree (0 for root).
    pub depth: u32,
    pub branch_variable: Option<usize>,
    pub branch_direction: Option<BranchDirection>,
    pub status: NodeStatus,
    pub reason: Option<FathomReason>,
}

/// Best integer-feasible solution found so far
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Incumbent {
    pub values: Vec<f64>,
    pub objective_value: f64,
    pub node: NodeId,
}

/// What happened at one step of the search
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum BranchAndBoundAction {
    /// Root node created
    Start,
    Fathomed(FathomReason),
    /// Integral relaxation; `improved` when it replaced the incumbent
    IntegerSolution { improved: bool },
    Branched { variable: usize, value: f64 },
    Finished(SolutionStatus),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BranchAndBoundStep {
    pub current_node: Option<NodeId>,
    /// Snapshot of the whole tree after this step
    pub tree: Vec<BranchAndBoundNode>,
    pub incumbent: Option<Incumbent>,
    pub action: BranchAndBoundAction,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BranchAndBoundTrace {
    pub steps: Vec<BranchAndBoundStep>,
    pub status: SolutionStatus,
    pub incumbent: Option<Incumbent>,
}

impl BranchAndBoundNode {
    fn root(problem: LinearProgram, maximize: bool) -> Self {
        Self {
            id: 0,
            parent_id: None,
            problem,
            solution: None,
            bound: if maximize { f64::INFINITY } else { f64::NEG_INFINITY },
            depth: 0,
            branch_variable: None,
            branch_direction: None,
            status: NodeStatus::Active,
            reason: None,
        }
    }

    /// Child node adding one bound on `variable`
    fn child(&self, id: NodeId, variable: usize, value: f64, direction: BranchDirection) -> Self {
        let mut problem = self.problem.clone();
        let mut coefficients = vec![0.0; problem.num_variables()];
        coefficients[variable] = 1.0;
        let name = &problem.variables[variable];
        let (label, op, rhs) = match direction {
            BranchDirection::Down => (format!("{} <= {}", name, value.floor()), ConstraintOp::Le, value.floor()),
            BranchDirection::Up => (format!("{} >= {}", name, value.ceil()), ConstraintOp::Ge, value.ceil()),
        };
        problem.add_constraint(label, coefficients, op, rhs);

        Self {
            id,
            parent_id: Some(self.id),
            problem,
            solution: None,
            bound: self.bound,
            depth: self.depth + 1,
            branch_variable: Some(variable),
            branch_direction: Some(direction),
            status: NodeStatus::Active,
            reason: None,
        }
    }
}

impl BranchAndBoundTrace {
    /// Final tree
    pub fn tree(&self) -> &[BranchAndBoundNode] {
        self.steps.last().map(|step| step.tree.as_slice()).unwrap_or(&[])
    }
}

/// Search state: node arena, incumbent and the step trace built so far
struct Search<'a> {
    solver: &'a Solver,
    maximize: bool,
    integer_variables: Vec<usize>,
    nodes: Vec<BranchAndBoundNode>,
    incumbent: Option<Incumbent>,
    steps: Vec<BranchAndBoundStep>,
}

impl<'a> Search<'a> {
    fn record(&mut self, current_node: Option<NodeId>, action: BranchAndBoundAction) {
        self.steps.push(BranchAndBoundStep {
            current_node,
            tree: self.nodes.clone(),
            incumbent: self.incumbent.clone(),
            action,
        });
    }

    /// `a` is a strictly better objective than `b`
    fn better(&self, a: f64, b: f64) -> bool {
        if self.maximize { a > b } else { a < b }
    }

    /// Active node with the best bound, lowest id on ties
    fn select(&self) -> Option<NodeId> {
        let mut best: Option<NodeId> = None;
        for node in self.nodes.iter().filter(|n| n.status == NodeStatus::Active) {
            match best {
                Some(id) if !self.better(node.bound, self.nodes[id].bound) => {}
                _ => best = Some(node.id),
            }
        }
        best
    }

    /// Integer variable with the largest fractional part, lowest index on ties.
    /// `None` when every integer variable is integral.
    fn branching_variable(&self, values: &[f64]) -> Option<(usize, f64)> {
        let tol = self.solver.integrality_tolerance;
        let mut best: Option<(usize, f64, f64)> = None;
        for &j in &self.integer_variables {
            let value = values[j];
            if (value - value.round()).abs() <= tol {
                continue;
            }
            let fraction = value - value.floor();
            match best {
                Some((_, _, f)) if fraction <= f => {}
                _ => best = Some((j, value, fraction)),
            }
        }
        best.map(|(j, value, _)| (j, value))
    }

    fn fathom(&mut self, id: NodeId, reason: FathomReason) {
        log::debug!("node {} fathomed: {}", id, reason);
        self.nodes[id].status = NodeStatus::Fathomed;
        self.nodes[id].reason = Some(reason);
        self.record(Some(id), BranchAndBoundAction::Fathomed(reason));
    }

    fn finish(mut self, status: SolutionStatus) -> BranchAndBoundTrace {
        log::info!(
            "branch and bound finished: {:?} after {} nodes, incumbent {:?}",
            status,
            self.nodes.len(),
            self.incumbent.as_ref().map(|i| i.objective_value)
        );
        self.record(None, BranchAndBoundAction::Finished(status));
        BranchAndBoundTrace {
            steps: self.steps,
            status,
            incumbent: self.incumbent,
        }
    }

    fn run(mut self, max_iterations: usize) -> Result<BranchAndBoundTrace, ProblemError> {
        let mut processed = 0;

        loop {
            let Some(id) = self.select() else {
                let status = if self.incumbent.is_some() {
                    SolutionStatus::Optimal
                } else {
                    SolutionStatus::Infeasible
                };
                return Ok(self.finish(status));
            };

            if processed >= max_iterations {
                log::warn!("branch and bound stopped at the node limit ({})", max_iterations);
                return Ok(self.finish(SolutionStatus::IterationLimit));
            }
            processed += 1;

            let relaxation = self.solver.solve(&self.nodes[id].problem)?.solution;
            let feasible = relaxation.status == SolutionStatus::Optimal;
            if feasible {
                self.nodes[id].bound = relaxation.objective_value;
            }
            self.nodes[id].solution = Some(NodeSolution {
                values: relaxation.values.clone(),
                objective_value: relaxation.objective_value,
                feasible,
            });

            match relaxation.status {
                SolutionStatus::Optimal => {}
                SolutionStatus::Infeasible => {
                    self.fathom(id, FathomReason::Infeasible);
                    continue;
                }
                SolutionStatus::Unbounded => {
                    self.fathom(id, FathomReason::Unbounded);
                    return Ok(self.finish(SolutionStatus::Unbounded));
                }
                SolutionStatus::IterationLimit => {
                    self.fathom(id, FathomReason::IterationLimit);
                    return Ok(self.finish(SolutionStatus::IterationLimit));
                }
            }

            let objective = relaxation.objective_value;
            let tol = self.solver.tolerance;
            if let Some(best) = self.incumbent.as_ref().map(|i| i.objective_value) {
                let margin = if self.maximize { tol } else { -tol };
                if !self.better(objective, best + margin) {
                    self.fathom(id, FathomReason::Bounded);
                    continue;
                }
            }

            match self.branching_variable(&relaxation.values) {
                None => {
                    let improved = self
                        .incumbent
                        .as_ref()
                        .is_none_or(|incumbent| self.better(objective, incumbent.objective_value));
                    self.nodes[id].status = NodeStatus::Integer;
                    if improved {
                        log::info!("new incumbent at node {}: obj={}", id, objective);
                        self.incumbent = Some(Incumbent {
                            values: relaxation.values,
                            objective_value: objective,
                            node: id,
                        });
                    }
                    self.record(Some(id), BranchAndBoundAction::IntegerSolution { improved });
                }
                Some((variable, value)) => {
                    log::debug!(
                        "node {} branches on {} = {}",
                        id,
                        self.nodes[id].problem.variables[variable],
                        value
                    );
                    let down_id = self.nodes.len();
                    let down = self.nodes[id].child(down_id, variable, value, BranchDirection::Down);
                    let up = self.nodes[id].child(down_id + 1, variable, value, BranchDirection::Up);
                    self.nodes.push(down);
                    self.nodes.push(up);
                    self.nodes[id].status = NodeStatus::Branched;
                    self.record(Some(id), BranchAndBoundAction::Branched { variable, value });
                }
            }
        }
    }
}

impl Solver {
    /// Solve a mixed-integer program by branch and bound.
    ///
    /// `max_iterations` caps the number of nodes whose relaxation is solved.
    pub fn solve_branch_and_bound(
        &self,
        ip: &IntegerProgram,
        max_iterations: usize,
    ) -> Result<BranchAndBoundTrace, ProblemError> {
        ip.validate()?;

        let mut integer_variables = ip.integer_variables.clone();
        integer_variables.sort_unstable();
        integer_variables.dedup();

        let maximize = ip.program.is_maximization;
        let mut search = Search {
            solver: self,
            maximize,
            integer_variables,
            nodes: vec![BranchAndBoundNode::root(ip.program.clone(), maximize)],
            incumbent: None,
            steps: Vec::new(),
        };
        search.record(Some(0), BranchAndBoundAction::Start);
        search.run(max_iterations)
    }
}
