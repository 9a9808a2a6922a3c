//! Coordinate ascent variational updates for the latent factor
//! nodes of a multi-view factor analysis model.
//!
//! A factor node (Gaussian [`z_node::ZNode`] or spike-and-slab
//! [`sz_node::SzNode`]) pulls the expectations of its neighbours
//! through a [`markov_blanket::MarkovBlanket`], computes closed-form
//! updates of its variational posterior, and reports its share of the
//! evidence lower bound. The training loop that drives the nodes,
//! and the updates of every other node, live elsewhere.

pub mod backend;
pub mod expectations;
pub mod factor_node;
pub mod fixed_node;
pub mod markov_blanket;
pub mod mini_batch;
pub mod numeric;
pub mod sz_node;
pub mod views;
pub mod z_node;

pub use backend::{Backend, ComputeDevice, NodeOptions};
pub use expectations::Expectations;
pub use factor_node::FactorNode;
pub use fixed_node::FixedNode;
pub use markov_blanket::{MarkovBlanket, Node, Role, SharedNode};
pub use mini_batch::BatchMode;
pub use sz_node::SzNode;
pub use z_node::ZNode;
