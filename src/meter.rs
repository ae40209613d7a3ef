//! Energy accounting hooks for benchmark harnesses.
//!
//! The engine itself never meters; harnesses wrap a traversal in
//! [`measured`] with whatever counter the machine exposes (RAPL sysfs on
//! Linux servers, or [`NoopMeter`] where none is available).

/// A cumulative energy counter.
pub trait EnergyMeter {
    /// Starts (or restarts) the measurement window.
    fn start(&mut self) -> anyhow::Result<()>;

    /// Ends the window, returning the energy consumed in joules.
    fn stop(&mut self) -> anyhow::Result<f64>;
}

/// Meter that measures nothing and reports zero joules.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMeter;

impl EnergyMeter for NoopMeter {
    fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<f64> {
        Ok(0.0)
    }
}

/// Runs `f` inside a measurement window, returning its result and the
/// joules spent.
pub fn measured<M, R>(meter: &mut M, f: impl FnOnce() -> R) -> anyhow::Result<(R, f64)>
where
    M: EnergyMeter,
{
    meter.start()?;
    let result = f();
    let joules = meter.stop()?;
    Ok((result, joules))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_meter_reports_zero() {
        let mut meter = NoopMeter;
        let (value, joules) = measured(&mut meter, || 41 + 1).unwrap();
        assert_eq!(value, 42);
        assert_eq!(joules, 0.0);
    }
}
