//! Conservation and stability tests for the water balance.
//!
//! These tests verify that:
//! - The soil store conserves water in every branch, including both clamps
//! - The non-linear routing store never exceeds its stability ceiling
//! - The linear routing store reproduces its closed-form transient

use approx::{assert_abs_diff_eq, assert_relative_eq};
use flowcast_core::pdm::SoilMoistureStore;
use flowcast_core::routing::RoutingStore;

/// Deterministic storm sequence with dry spells (mm/day).
fn storm_rainfall(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let burst = ((x * 0.7).sin() * 60.0).max(0.0);
            if (i / 12) % 3 == 2 {
                0.0
            } else {
                burst + if i % 17 == 0 { 400.0 } else { 0.0 }
            }
        })
        .collect()
}

fn pet(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 3.0 + 2.0 * ((i as f64) * 0.3).cos())
        .collect()
}

mod soil_store_conservation {
    use super::*;

    /// Every step closes the balance rainfall - runoff - drainage - ET = dS/dt.
    #[test]
    fn test_every_step_balances() {
        let store = SoilMoistureStore::new(80.0, 10.0, 0.1);
        let rainfall = storm_rainfall(400);
        let pet = pet(400);
        let dt = 0.25;

        let mut storage = 4.0;
        for (&qp, &ep) in rainfall.iter().zip(&pet) {
            let step = store.step(storage, qp, ep, dt);
            let residual = (qp - step.runoff - step.drainage - step.actual_et) * dt
                - (step.storage - storage);
            assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-9);
            assert!(step.storage >= 0.0 && step.storage <= 80.0);
            storage = step.storage;
        }
    }

    /// Running dry: drainage stops and ET is limited to the water available.
    #[test]
    fn test_dry_branch_limits_evapotranspiration() {
        let store = SoilMoistureStore::new(80.0, 10.0, 0.1);
        let dt = 0.25;
        let mut dry_steps = 0;

        let mut storage = 2.0;
        for i in 0..200 {
            let qp = if i % 50 == 0 { 8.0 } else { 0.0 };
            let ep = 6.0;
            let fraction = store.saturated_fraction(storage);
            let step = store.step(storage, qp, ep, dt);

            let trial = storage + ((1.0 - fraction) * qp - ep - 10.0 * storage / 80.0) * dt;
            if trial <= 0.0 {
                dry_steps += 1;
                assert_eq!(step.drainage, 0.0);
                assert_eq!(step.storage, 0.0);
                assert!(step.actual_et <= (1.0 - fraction) * qp + storage / dt + 1e-12);
            }
            storage = step.storage;
        }
        assert!(dry_steps > 0, "scenario should exercise the dry branch");
    }

    /// Overflowing: storage pins to Smax and runoff takes the excess.
    #[test]
    fn test_saturation_branch_pins_storage() {
        let store = SoilMoistureStore::new(80.0, 10.0, 0.1);
        let dt = 1.0;
        let mut saturated_steps = 0;

        let mut storage = 70.0;
        for _ in 0..20 {
            let step = store.step(storage, 150.0, 1.0, dt);
            if step.storage == 80.0 {
                saturated_steps += 1;
                let inflow = 150.0 * dt;
                let outflow = (step.runoff + step.drainage + step.actual_et) * dt;
                assert_abs_diff_eq!(inflow - outflow - (80.0 - storage), 0.0, epsilon = 1e-9);
            }
            storage = step.storage;
        }
        assert!(saturated_steps > 0);
    }

    /// Cumulative balance over a whole run.
    #[test]
    fn test_run_conserves_mass() {
        let store = SoilMoistureStore::new(120.0, 6.0, 0.1);
        let rainfall = storm_rainfall(1000);
        let pet = pet(1000);
        let dt = 0.25;
        let initial = 30.0;

        let output = store.run(initial, &rainfall, &pet, dt).unwrap();
        let rain: f64 = rainfall.iter().sum::<f64>() * dt;
        let out: f64 = (0..rainfall.len())
            .map(|i| (output.runoff[i] + output.drainage[i] + output.actual_et[i]) * dt)
            .sum();
        let change = output.final_storage().unwrap() - initial;

        assert_relative_eq!(rain - out, change, epsilon = 1e-6);
    }
}

mod routing_stability {
    use super::*;

    /// Extreme constant inflow drives the fast store onto its ceiling, never past it.
    #[test]
    fn test_extreme_inflow_pins_storage_at_ceiling() {
        let dt = 0.25;
        let store = RoutingStore::nonlinear(50.0, 5.0 / 3.0, dt);
        let vmax = store.storage_ceiling();
        let inflow = vec![5_000.0; 500];

        let output = store.run(&inflow, 2.0);

        assert!(output.clamped_steps > 0);
        for (&v, &q) in output.storage.iter().zip(&output.outflow) {
            assert!(v <= vmax, "storage {} exceeded ceiling {}", v, vmax);
            assert!(q.is_finite() && q >= 0.0);
        }
        assert_eq!(*output.storage.last().unwrap(), vmax);
        // Pinned storage passes inflow straight through
        assert_relative_eq!(*output.outflow.last().unwrap(), 5_000.0, epsilon = 1e-9);
        assert!(output.terminal_outflow.is_finite());
    }

    /// A flood through the unclamped explicit scheme overshoots into negative storage.
    #[test]
    fn test_unclamped_scheme_diverges() {
        let dt = 0.25;
        let store = RoutingStore::nonlinear(50.0, 5.0 / 3.0, dt);
        let (a, b) = (store.coefficient(), store.exponent());

        let mut v = store.storage_ceiling() * 1.5;
        let mut diverged = false;
        for _ in 0..50 {
            v += (1.0e6 - a * v.powf(b)) * dt;
            if !v.is_finite() || v < 0.0 {
                diverged = true;
                break;
            }
        }
        assert!(diverged, "explicit scheme above the ceiling should be unstable");
    }
}

mod linear_store_solution {
    use super::*;

    /// For constant inflow the transient decays geometrically:
    /// q_i - q_s = (q_0 - q_s) (1 - dt/Tr)^i
    #[test]
    fn test_transient_matches_closed_form() {
        let tr = 5.0;
        let dt = 0.25;
        let qs = 3.0;
        let q0 = 10.0;
        let store = RoutingStore::linear(tr, dt);

        let output = store.run(&vec![qs; 200], q0);
        let ratio = 1.0 - dt / tr;

        for (i, q) in output.outflow.iter().enumerate() {
            let expected = qs + (q0 - qs) * ratio.powi(i as i32);
            assert_relative_eq!(*q, expected, epsilon = 1e-9, max_relative = 1e-9);
        }
        assert_relative_eq!(*output.outflow.last().unwrap(), qs, epsilon = 1e-3);
    }

    /// With a short timestep the discrete decay approaches exp(-t/Tr).
    #[test]
    fn test_small_timestep_approaches_exponential() {
        let tr = 5.0;
        let dt = 0.001;
        let store = RoutingStore::linear(tr, dt);
        let steps = 5_000; // 5 days

        let output = store.run(&vec![0.0; steps + 1], 1.0);
        let t = steps as f64 * dt;
        assert_relative_eq!(output.outflow[steps], (-t / tr).exp(), max_relative = 1e-3);
    }
}
