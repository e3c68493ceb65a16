//! Parallel calibration of a sensor fleet.
//!
//! Every session is independent: it owns its state and only reads the shared
//! reference frame. [`calibrate_fleet`] hands each session to one rayon task
//! with `par_iter_mut`, and returns only after all tasks have finished, so
//! the consistency check that follows sees the final state of every session.
//!
//! # Determinism
//!
//! Each session's outcome is a pure function of its own state, its cloud and
//! the shared reference. Output is independent of thread count and
//! scheduling order, and matches [`calibrate_fleet_sequential`] exactly.

use lidar_types::PointCloud;
use rayon::prelude::*;
use tracing::info;

use crate::{
    Calibration, CalibrationError, CalibrationResult, CalibrationSession, ConsistencyReport,
    check_consistency,
};

/// Outcome of one calibration cycle across the fleet.
#[derive(Debug, Clone)]
pub struct FleetRun {
    /// Per-session outcomes, in session order.
    pub outcomes: Vec<CalibrationResult<Calibration>>,
    /// Consistency verdict over the sessions after the cycle.
    pub consistency: ConsistencyReport,
}

impl FleetRun {
    /// Number of sessions that calibrated successfully in this cycle.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }
}

fn check_sizes(sessions: &[CalibrationSession], clouds: &[PointCloud]) -> CalibrationResult<()> {
    if sessions.len() == clouds.len() {
        Ok(())
    } else {
        Err(CalibrationError::FleetSizeMismatch {
            sessions: sessions.len(),
            clouds: clouds.len(),
        })
    }
}

/// Calibrates every session against its cloud on the rayon pool.
///
/// `clouds[i]` is the raw cloud for `sessions[i]`. Individual failures are
/// reported per session and leave that session unchanged.
///
/// # Errors
///
/// Returns [`CalibrationError::FleetSizeMismatch`] if the slices differ in length.
pub fn calibrate_fleet(
    sessions: &mut [CalibrationSession],
    clouds: &[PointCloud],
) -> CalibrationResult<Vec<CalibrationResult<Calibration>>> {
    check_sizes(sessions, clouds)?;
    Ok(sessions
        .par_iter_mut()
        .zip(clouds)
        .map(|(session, cloud)| session.calibrate_sensor(cloud).cloned())
        .collect())
}

/// Calibrates every session in order on the calling thread.
///
/// Produces the same outcomes as [`calibrate_fleet`].
///
/// # Errors
///
/// Returns [`CalibrationError::FleetSizeMismatch`] if the slices differ in length.
pub fn calibrate_fleet_sequential(
    sessions: &mut [CalibrationSession],
    clouds: &[PointCloud],
) -> CalibrationResult<Vec<CalibrationResult<Calibration>>> {
    check_sizes(sessions, clouds)?;
    Ok(sessions
        .iter_mut()
        .zip(clouds)
        .map(|(session, cloud)| session.calibrate_sensor(cloud).cloned())
        .collect())
}

/// Runs one calibration cycle: calibrates the fleet in parallel, then checks
/// consistency on the joined sessions.
///
/// # Errors
///
/// Returns [`CalibrationError::FleetSizeMismatch`] if the slices differ in length.
pub fn run_fleet(
    sessions: &mut [CalibrationSession],
    clouds: &[PointCloud],
    tolerance: f64,
) -> CalibrationResult<FleetRun> {
    let outcomes = calibrate_fleet(sessions, clouds)?;
    let consistency = check_consistency(sessions, tolerance);
    let run = FleetRun {
        outcomes,
        consistency,
    };
    info!(
        sessions = sessions.len(),
        succeeded = run.succeeded(),
        verdict = %run.consistency.verdict,
        "Fleet calibration cycle complete"
    );
    Ok(run)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{CalibrationConfig, ReferenceFrame};

    fn fleet(n: usize) -> (PointCloud, Vec<CalibrationSession>) {
        let reference = PointCloud::from_tuples([
            (1.0, 0.0, 0.0),
            (0.0, 2.0, 0.0),
            (0.0, 0.0, 3.0),
            (1.0, 1.0, 1.0),
            (-2.0, 1.0, 0.5),
            (0.5, -1.5, 2.0),
        ]);
        let frame = ReferenceFrame::shared(reference.clone()).unwrap();
        let sessions = (0..n)
            .map(|i| {
                CalibrationSession::new(
                    format!("lidar_{i}"),
                    frame.clone(),
                    CalibrationConfig::default(),
                )
                .unwrap()
            })
            .collect();
        (reference, sessions)
    }

    #[test]
    fn test_size_mismatch() {
        let (reference, mut sessions) = fleet(3);
        let err = calibrate_fleet(&mut sessions, &[reference]).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::FleetSizeMismatch {
                sessions: 3,
                clouds: 1
            }
        );
    }

    #[test]
    fn test_empty_fleet() {
        let mut sessions: Vec<CalibrationSession> = Vec::new();
        let run = run_fleet(&mut sessions, &[], 0.02).unwrap();
        assert!(run.outcomes.is_empty());
        assert!(!run.consistency.passed());
    }

    #[test]
    fn test_run_fleet_reports_each_session() {
        let (reference, mut sessions) = fleet(2);
        let clouds = vec![reference, PointCloud::new()];
        let run = run_fleet(&mut sessions, &clouds, 0.02).unwrap();
        assert_eq!(run.succeeded(), 1);
        assert!(run.outcomes[1].is_err());
        assert_eq!(run.consistency.failing_sensors().len(), 1);
        assert_eq!(run.consistency.failing_sensors()[0].as_str(), "lidar_1");
    }
}
