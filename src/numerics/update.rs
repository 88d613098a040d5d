//! Per-cell update rules of the nonlinear driver.

/// `u + damping * du`
#[inline]
pub fn damped_update(current: f64, update: f64, damping: f64) -> f64 {
    current + damping * update
}

/// Largest relative update `max |du / u|` over cells with `u != 0`.
pub fn max_relative_update<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    pairs
        .into_iter()
        .filter(|(current, _)| *current != 0.0)
        .map(|(current, update)| (update / current).abs())
        .fold(0.0, f64::max)
}

/// Positivity-preserving update for quantities that must stay positive.
///
/// `max_relative` is [`max_relative_update`] over all active cells of the
/// quantity. Decreases are damped rationally, increases geometrically:
///
/// ```text
/// du < 0:  u + damping * du / (1 - A * du / u)
/// du >= 0: u^(1 - damping) * (u + du)^damping
/// ```
///
/// A cell at exactly zero has no relative scale and takes the damped update.
pub fn geometric_update(current: f64, update: f64, damping: f64, max_relative: f64) -> f64 {
    if current == 0.0 {
        return damped_update(current, update, damping);
    }
    if update < 0.0 {
        current + damping * (update / (1.0 - max_relative * (update / current)))
    } else {
        current.powf(1.0 - damping) * (current + update).powf(damping)
    }
}
