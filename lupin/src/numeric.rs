use ndarray::prelude::*;
use ndarray::Zip;

/// Step size of a stochastic update; `None` means full replacement
pub fn step_size(ro: Option<f32>) -> anyhow::Result<f32> {
    let ro = ro.unwrap_or(1.0);
    if !(ro > 0.0 && ro <= 1.0) {
        anyhow::bail!("step size must lie in (0, 1], found {}", ro);
    }
    Ok(ro)
}

/// Natural-gradient step of a column of Gaussians towards
/// `(new_mean, new_var)`: precision and precision-weighted mean move
/// by `ro`.
pub fn blend_gaussian(
    mut mean: ArrayViewMut1<f32>,
    mut var: ArrayViewMut1<f32>,
    new_mean: &Array1<f32>,
    new_var: &Array1<f32>,
    ro: f32,
) {
    if ro >= 1.0 {
        mean.assign(new_mean);
        var.assign(new_var);
        return;
    }
    Zip::from(&mut mean)
        .and(&mut var)
        .and(new_mean)
        .and(new_var)
        .for_each(|m, v, &m_new, &v_new| {
            let prec = (1.0 - ro) / *v + ro / v_new;
            let eta = (1.0 - ro) * *m / *v + ro * m_new / v_new;
            *v = 1.0 / prec;
            *m = eta / prec;
        });
}

/// Step of a column of probabilities towards `new_prob`
pub fn blend_probability(mut prob: ArrayViewMut1<f32>, new_prob: &Array1<f32>, ro: f32) {
    if ro >= 1.0 {
        prob.assign(new_prob);
        return;
    }
    Zip::from(&mut prob)
        .and(new_prob)
        .for_each(|p, &p_new| *p = (1.0 - ro) * *p + ro * p_new);
}

/// `1/(1 + exp(-x))`, with NaN mapped to 0
pub fn sigmoid(x: f32) -> f32 {
    let y = 1.0 / (1.0 + (-x).exp());
    if y.is_nan() {
        0.0
    } else {
        y
    }
}

pub fn sum_f64(x: &Array2<f32>) -> f64 {
    x.iter().map(|&v| v as f64).sum()
}

/// Sum that skips NaN entries (saturated `0 * ln 0` terms)
pub fn nan_sum_f64(x: &Array2<f32>) -> f64 {
    x.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).sum()
}
