use std::fs;
use std::process::ExitCode;

use log::{error, info, warn};
use thiserror::Error;

use vbox_fvm::models::pn::{pn_problem_def, PnJunctionModel, N, P, PSI};
use vbox_fvm::numerics::linear::{KrylovConfig, KrylovSolver};
use vbox_fvm::numerics::{ConvergenceGate, PicardConfig};
use vbox_fvm::processing::export::{export_csv_named, write_history, ExportError};

const OUTPUT_DIR: &str = "output/main";

#[derive(Debug, Error)]
enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Solver settings: the JSON file given as first argument, or the defaults
/// tuned for the diode.
fn load_config(path: Option<String>) -> Result<PicardConfig, ConfigError> {
    match path {
        Some(path) => {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(source) => return Err(ConfigError::Read { path, source }),
            };
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
        }
        None => Ok(PicardConfig::default()
            .with_max_iterations(500)
            .with_break_tolerance(1e-9)
            .with_gate(ConvergenceGate::AllQuantities)
            .with_logging(true)),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config(std::env::args().nth(1)) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = fs::create_dir_all(OUTPUT_DIR) {
        error!("cannot create {OUTPUT_DIR}: {e}");
        return ExitCode::FAILURE;
    }

    let (mesh, params) = pn_problem_def(1.0, 300, 0.0);
    let model = PnJunctionModel::new(params.clone());
    let linear = KrylovSolver::new(KrylovConfig::default());

    let (state, outcome) = match model.solve(&mesh, config, &linear) {
        Ok(solved) => solved,
        Err(e) => {
            error!("solve failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    if outcome.converged {
        info!(
            "converged after {} iterations ({} linear iterations)",
            outcome.iterations, outcome.linear_iterations
        );
    } else {
        warn!("writing the last iterate of an unconverged solve");
    }

    let solution = format!("{OUTPUT_DIR}/solution.csv");
    let history = format!("{OUTPUT_DIR}/solver_history.csv");
    let written = export_csv_named(
        &solution,
        &outcome.result,
        &mesh,
        &state,
        &[(PSI, "psi"), (N, "n"), (P, "p")],
    )
    .and_then(|()| {
        write_history(&history, &outcome.update_norms, &["psi", "n", "p"]).map_err(ExportError::from)
    });
    if let Err(e) = written {
        error!("cannot write results: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "results in {solution} (potential in units of {:.4} V, densities of {:.2e} cm^-3)",
        params.v_scale, params.n_scale
    );
    ExitCode::SUCCESS
}
