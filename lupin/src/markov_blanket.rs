use crate::expectations::Expectations;
use ndarray::Array2;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// What a neighbour has to offer to a factor node. Every method
/// returns one entry per view; single-view nodes return one entry.
pub trait Node {
    fn expectations(&self) -> anyhow::Result<Vec<Expectations>>;

    /// Expectations restricted to the last minibatch, or the full
    /// expectations when there is none
    fn mini_batch(&self) -> anyhow::Result<Vec<Expectations>> {
        self.expectations()
    }

    /// Missing-observation masks (true = missing), full rows
    fn masks(&self) -> anyhow::Result<Vec<Array2<bool>>> {
        Ok(vec![])
    }
}

impl<T: Node + ?Sized> Node for RefCell<T> {
    fn expectations(&self) -> anyhow::Result<Vec<Expectations>> {
        self.borrow().expectations()
    }

    fn mini_batch(&self) -> anyhow::Result<Vec<Expectations>> {
        self.borrow().mini_batch()
    }

    fn masks(&self) -> anyhow::Result<Vec<Array2<bool>>> {
        self.borrow().masks()
    }
}

pub type SharedNode = Rc<dyn Node>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// loadings, one entry per view
    W,
    /// observations, one entry per view, with masks
    Y,
    /// noise precision, one entry per view
    Tau,
    /// prior mean of the factors
    MuZ,
    /// prior precision (ARD) of the factors
    AlphaZ,
    /// prior inclusion probability of the factors
    ThetaZ,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::W => "W",
            Role::Y => "Y",
            Role::Tau => "Tau",
            Role::MuZ => "MuZ",
            Role::AlphaZ => "AlphaZ",
            Role::ThetaZ => "ThetaZ",
        };
        write!(f, "{}", name)
    }
}

/// Neighbours of a node, keyed by the role they play for it
#[derive(Clone, Default)]
pub struct MarkovBlanket {
    nodes: HashMap<Role, SharedNode>,
}

impl MarkovBlanket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: Role, node: SharedNode) -> Self {
        self.nodes.insert(role, node);
        self
    }

    pub fn contains(&self, role: Role) -> bool {
        self.nodes.contains_key(&role)
    }

    pub fn get(&self, role: Role) -> Option<&SharedNode> {
        self.nodes.get(&role)
    }

    /// Look up a neighbour that has to be there
    pub fn node(&self, role: Role) -> anyhow::Result<&SharedNode> {
        self.get(role)
            .ok_or_else(|| anyhow::anyhow!("{} is missing from the markov blanket", role))
    }

    /// Fail unless all of `roles` are present
    pub fn require(&self, roles: &[Role]) -> anyhow::Result<()> {
        let missing: Vec<String> = roles
            .iter()
            .filter(|r| !self.contains(**r))
            .map(|r| r.to_string())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("markov blanket lacks {}", missing.join(", "));
        }
        Ok(())
    }

    /// Minibatch expectations of a single-view neighbour, if present
    pub fn single_mini_batch(&self, role: Role) -> anyhow::Result<Option<Expectations>> {
        self.get(role)
            .map(|node| single(role, node.mini_batch()?))
            .transpose()
    }

    /// Full expectations of a single-view neighbour, if present
    pub fn single_expectations(&self, role: Role) -> anyhow::Result<Option<Expectations>> {
        self.get(role)
            .map(|node| single(role, node.expectations()?))
            .transpose()
    }
}

fn single(role: Role, mut views: Vec<Expectations>) -> anyhow::Result<Expectations> {
    if views.len() != 1 {
        anyhow::bail!("{} should have one view, found {}", role, views.len());
    }
    Ok(views.swap_remove(0))
}
