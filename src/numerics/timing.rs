//! Wall-clock breakdown of a solve, per equation and per phase.
//! Everything here is a pass-through unless the `timing` feature is on.

#[cfg(feature = "timing")]
use std::cell::RefCell;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Assembly,
    LinearSolve,
}

/// One timed call.
#[derive(Clone, Copy, Debug)]
pub struct PhaseSample {
    pub pde: usize,
    pub phase: Phase,
    pub elapsed: Duration,
}

#[derive(Default, Clone, Debug)]
pub struct TimingStats {
    pub samples: Vec<PhaseSample>,
    pub total_time: Duration,
}

impl TimingStats {
    /// Summed time and call count of `phase` for equation `pde`.
    pub fn total(&self, pde: usize, phase: Phase) -> (Duration, usize) {
        self.samples
            .iter()
            .filter(|s| s.pde == pde && s.phase == phase)
            .fold((Duration::ZERO, 0), |(t, n), s| (t + s.elapsed, n + 1))
    }

    fn num_pdes(&self) -> usize {
        self.samples.iter().map(|s| s.pde + 1).max().unwrap_or(0)
    }

    /// Table of assembly and solve time per equation, then the unaccounted rest.
    pub fn print_summary(&self, names: &[&str]) {
        if self.samples.is_empty() {
            return;
        }
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;

        println!("\n{}", "=".repeat(60));
        println!("{:^60}", "PICARD TIMING SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "{:<12} | {:>6} | {:>12} | {:>12} | {:>8}",
            "Equation", "Passes", "Assembly", "Solve", "avg/pass"
        );
        println!("{}", "-".repeat(60));

        let mut accounted = Duration::ZERO;
        for pde in 0..self.num_pdes() {
            let (assembly, passes) = self.total(pde, Phase::Assembly);
            let (solve, _) = self.total(pde, Phase::LinearSolve);
            accounted += assembly + solve;
            let name = names.get(pde).copied().unwrap_or("?");
            println!(
                "{:<12} | {:>6} | {:>10.3}ms | {:>10.3}ms | {:>6.3}ms",
                name,
                passes,
                ms(assembly),
                ms(solve),
                ms(assembly + solve) / passes.max(1) as f64
            );
        }
        println!("{}", "-".repeat(60));
        println!("Total:    {:>9.3}s", self.total_time.as_secs_f64());
        println!(
            "Other:    {:>9.3}ms\n",
            ms(self.total_time.saturating_sub(accounted))
        );
    }
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMING_STATS: RefCell<TimingStats> = RefCell::new(TimingStats::default());
}

pub fn reset_timing() {
    #[cfg(feature = "timing")]
    TIMING_STATS.with(|stats| *stats.borrow_mut() = TimingStats::default());
}

#[cfg(feature = "timing")]
fn record<F, R>(pde: usize, phase: Phase, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMING_STATS.with(|stats| {
        stats.borrow_mut().samples.push(PhaseSample { pde, phase, elapsed });
    });
    result
}

#[cfg(not(feature = "timing"))]
#[inline(always)]
fn record<F, R>(_pde: usize, _phase: Phase, f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

pub fn record_assembly<F, R>(pde: usize, f: F) -> R
where
    F: FnOnce() -> R,
{
    record(pde, Phase::Assembly, f)
}

pub fn record_linear_solve<F, R>(pde: usize, f: F) -> R
where
    F: FnOnce() -> R,
{
    record(pde, Phase::LinearSolve, f)
}

/// Samples collected since the last [`reset_timing`], stamped with `total_time`.
#[cfg(feature = "timing")]
pub fn finalize_timing(total_time: Duration) -> TimingStats {
    TIMING_STATS.with(|stats| {
        let mut s = stats.borrow_mut();
        s.total_time = total_time;
        s.clone()
    })
}

#[cfg(not(feature = "timing"))]
pub fn finalize_timing(total_time: Duration) -> TimingStats {
    TimingStats {
        samples: Vec::new(),
        total_time,
    }
}

#[cfg(feature = "timing")]
pub fn finalize_and_print(total_time: Duration, names: &[&str]) {
    finalize_timing(total_time).print_summary(names);
}

#[cfg(not(feature = "timing"))]
pub fn finalize_and_print(_total_time: Duration, _names: &[&str]) {}
