mod common;

use approx::assert_abs_diff_eq;
use candle_core::Device;
use common::*;
use lupin::{Backend, Expectations, FactorNode, Role, SzNode};
use matrix_param::traits::Inference;
use matrix_param::{SpikeSlabMatrix, SpikeSlabParams};
use matrix_util::traits::{SampleOps, SubsetOps};
use ndarray::prelude::*;

const PRIOR_THETA: f32 = 0.3;

fn new_node(mean_b1: &Array2<f32>, theta: f32) -> anyhow::Result<SzNode> {
    let dims = mean_b1.dim();
    let p = SpikeSlabMatrix::from_elem(dims, 0.0, 1.0, PRIOR_THETA)?;
    let q = SpikeSlabMatrix::new(SpikeSlabParams {
        mean_b0: Array2::zeros(dims),
        var_b0: Array2::ones(dims),
        mean_b1: mean_b1.clone(),
        var_b1: Array2::ones(dims),
        theta: Array2::from_elem(dims, theta),
    })?;
    SzNode::new(p, q)
}

fn attached(sim: &Sim, init: &Array2<f32>) -> anyhow::Result<(SzNode, Neighbours)> {
    let nb = neighbours(sim)?;
    let mut node = new_node(init, 0.5)?;
    node.set_markov_blanket(nb.blanket.clone())?;
    Ok((node, nb))
}

#[test]
fn full_update_matches_elementwise_sweep() -> anyhow::Result<()> {
    init_logger();
    let (n, k) = (15, 3);
    let sim = Sim::new(n, k, &[6, 4])
        .with_missing(0, &[(1, 1), (8, 5)])
        .with_missing(1, &[(14, 0)]);
    let init = Array2::<f32>::rnorm(n, k);
    let (mut node, _nb) = attached(&sim, &init)?;

    node.update_parameters(None, None)?;

    let mut mean_b1 = init.clone();
    let mut var_b1 = Array2::<f32>::ones((n, k));
    let mut theta = Array2::<f32>::from_elem((n, k), 0.5);
    naive_spike_slab_sweep(
        &sim,
        &Array2::ones((n, k)),
        &Array2::from_elem((n, k), PRIOR_THETA),
        &mut mean_b1,
        &mut var_b1,
        &mut theta,
    );

    let q = node.q();
    assert_abs_diff_eq!(q.mean_b1(), &mean_b1, epsilon = 1e-3);
    assert_abs_diff_eq!(q.var_b1(), &var_b1, epsilon = 1e-5);
    assert_abs_diff_eq!(q.theta(), &theta, epsilon = 1e-3);

    assert!(q.theta().iter().all(|t| (0.0..=1.0).contains(t)));
    assert_abs_diff_eq!(q.posterior_mean(), &(q.theta() * q.mean_b1()), epsilon = 1e-6);
    assert_abs_diff_eq!(q.posterior_inclusion(), q.theta());

    // the spike follows the prior precision
    assert!(q.mean_b0().iter().all(|&m| m == 0.0));
    assert_abs_diff_eq!(q.var_b0(), &Array2::ones((n, k)));
    Ok(())
}

#[test]
fn zero_loadings_keep_prior_inclusion() -> anyhow::Result<()> {
    let (n, k) = (5, 2);
    let mut sim = Sim::new(n, k, &[3]);
    sim.w[0].fill(0.0);
    sim.w_var[0].fill(0.0);

    let (mut node, _nb) = attached(&sim, &Array2::<f32>::rnorm(n, k))?;
    node.update_parameters(None, None)?;

    let q = node.q();
    assert_abs_diff_eq!(q.theta(), &Array2::from_elem((n, k), PRIOR_THETA), epsilon = 1e-6);
    assert_abs_diff_eq!(q.mean_b1(), &Array2::zeros((n, k)));
    assert_abs_diff_eq!(q.var_b1(), &Array2::ones((n, k)));
    Ok(())
}

#[test]
fn theta_neighbour_replaces_prior_probability() -> anyhow::Result<()> {
    let (n, k) = (7, 3);
    let sim = Sim::new(n, k, &[5]);
    let init = Array2::<f32>::rnorm(n, k);

    let (mut fallback, _nb1) = attached(&sim, &init)?;
    fallback.update_parameters(None, None)?;

    let nb = neighbours(&sim)?;
    let theta = Array2::from_elem((1, k), PRIOR_THETA);
    let blanket = nb.blanket.clone().with(
        Role::ThetaZ,
        fixed(
            Expectations::new(theta.clone())
                .with_ln_e(theta.mapv(f32::ln))
                .with_ln_e_inv(theta.mapv(|t| (1.0 - t).ln())),
        ),
    );
    let mut node = new_node(&init, 0.5)?;
    node.set_markov_blanket(blanket)?;
    node.update_parameters(None, None)?;

    assert_abs_diff_eq!(node.q().theta(), fallback.q().theta(), epsilon = 1e-5);
    assert_abs_diff_eq!(node.q().mean_b1(), fallback.q().mean_b1(), epsilon = 1e-5);
    assert_abs_diff_eq!(node.calculate_elbo()?, fallback.calculate_elbo()?, epsilon = 1e-2);
    Ok(())
}

#[test]
fn theta_neighbour_needs_log_moments() -> anyhow::Result<()> {
    let sim = Sim::new(4, 2, &[3]);
    let nb = neighbours(&sim)?;
    let blanket = nb.blanket.clone().with(
        Role::ThetaZ,
        fixed(Expectations::new(Array2::from_elem((1, 2), 0.5))),
    );
    let mut node = new_node(&Array2::zeros((4, 2)), 0.5)?;
    node.set_markov_blanket(blanket)?;
    let err = node.update_parameters(None, None).unwrap_err();
    assert!(err.to_string().contains("lnE"));
    assert_abs_diff_eq!(node.q().theta(), &Array2::from_elem((4, 2), 0.5));
    Ok(())
}

#[test]
fn minibatch_cache_is_consistent() -> anyhow::Result<()> {
    init_logger();
    let (n, k) = (9, 2);
    let sim = Sim::new(n, k, &[4]).with_missing(0, &[(5, 1)]);
    let init = Array2::<f32>::rnorm(n, k);
    let (mut node, nb) = attached(&sim, &init)?;

    let ix = [5, 0, 8];
    nb.y.borrow_mut().set_mini_batch(&ix)?;
    node.update_parameters(Some(&ix), None)?;

    let q = node.q();
    let cached = node.get_mini_batch();
    assert_eq!(cached.nrows(), ix.len());
    assert_abs_diff_eq!(cached.eb()?, &q.theta().select_rows(&ix)?);
    assert_abs_diff_eq!(cached.e, q.posterior_mean().select_rows(&ix)?, epsilon = 1e-6);
    assert_abs_diff_eq!(
        cached.e2()?,
        &q.posterior_second_moment().select_rows(&ix)?,
        epsilon = 1e-5
    );
    assert_abs_diff_eq!(
        cached.enn()?,
        &q.posterior_zero_inflated_second_moment().select_rows(&ix)?,
        epsilon = 1e-5
    );

    for i in (0..n).filter(|i| !ix.contains(i)) {
        assert_eq!(q.mean_b1().row(i), init.row(i));
        assert!(q.theta().row(i).iter().all(|&t| t == 0.5));
        assert!(q.var_b1().row(i).iter().all(|&v| v == 1.0));
    }

    // rows of the minibatch match the full update of those rows
    let (mut full, _nb) = attached(&sim, &init)?;
    full.update_parameters(None, None)?;
    assert_abs_diff_eq!(
        q.theta().select_rows(&ix)?,
        full.q().theta().select_rows(&ix)?,
        epsilon = 1e-5
    );
    assert_abs_diff_eq!(
        q.mean_b1().select_rows(&ix)?,
        full.q().mean_b1().select_rows(&ix)?,
        epsilon = 1e-4
    );
    assert!(node.batch_mode().is_mini_batch());
    assert!(!full.batch_mode().is_mini_batch());
    assert_eq!(full.get_mini_batch().nrows(), n);
    Ok(())
}

#[test]
fn saturated_inclusion_keeps_elbo_finite() -> anyhow::Result<()> {
    let (n, k) = (2, 2);
    let sim = Sim::new(n, k, &[3]);
    let nb = neighbours(&sim)?;

    let p = SpikeSlabMatrix::from_elem((n, k), 0.0, 1.0, PRIOR_THETA)?;
    let q = SpikeSlabMatrix::new(SpikeSlabParams {
        mean_b0: Array2::zeros((n, k)),
        var_b0: Array2::from_elem((n, k), 2.0),
        mean_b1: array![[1.0, -1.0], [0.5, 2.0]],
        var_b1: Array2::from_elem((n, k), 0.5),
        theta: array![[0.0, 1.0], [1.0, 0.0]],
    })?;

    // theta = 0 leaves only the spike, theta = 1 only the slab
    let enn = q.posterior_zero_inflated_second_moment();
    assert_abs_diff_eq!(enn[(0, 0)], 2.0);
    assert_abs_diff_eq!(enn[(0, 1)], 1.5);
    assert_abs_diff_eq!(q.posterior_mean()[(0, 0)], 0.0);

    let mut node = SzNode::new(p, q)?;
    node.set_markov_blanket(nb.blanket.clone())?;
    assert!(node.calculate_elbo()?.is_finite());

    node.update_parameters(None, None)?;
    assert!(node.calculate_elbo()?.is_finite());
    Ok(())
}

#[test]
fn candle_cpu_matches_ndarray() -> anyhow::Result<()> {
    let (n, k) = (8, 3);
    let sim = Sim::new(n, k, &[4, 5]).with_missing(0, &[(3, 3)]);
    let init = Array2::<f32>::rnorm(n, k);

    let (mut host, _nb1) = attached(&sim, &init)?;
    host.update_parameters(None, Some(0.7))?;

    let nb = neighbours(&sim)?;
    let mut dev = new_node(&init, 0.5)?.with_backend(Backend::Candle(Device::Cpu));
    dev.set_markov_blanket(nb.blanket.clone())?;
    dev.update_parameters(None, Some(0.7))?;

    assert_abs_diff_eq!(host.q().mean_b1(), dev.q().mean_b1(), epsilon = 1e-4);
    assert_abs_diff_eq!(host.q().theta(), dev.q().theta(), epsilon = 1e-4);
    assert_abs_diff_eq!(host.calculate_elbo()?, dev.calculate_elbo()?, epsilon = 1e-2);
    Ok(())
}

#[test]
fn half_step_moves_inclusion_halfway() -> anyhow::Result<()> {
    let (n, k) = (6, 1);
    let sim = Sim::new(n, k, &[4]);
    let init = Array2::<f32>::rnorm(n, k);

    let (mut full, _nb1) = attached(&sim, &init)?;
    full.update_parameters(None, None)?;
    let (mut half, _nb2) = attached(&sim, &init)?;
    half.update_parameters(None, Some(0.5))?;

    // with one factor the targets do not depend on the step
    let expected = full.q().theta().mapv(|t| 0.5 * 0.5 + 0.5 * t);
    assert_abs_diff_eq!(half.q().theta(), &expected, epsilon = 1e-5);
    Ok(())
}
