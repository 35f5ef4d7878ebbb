#[macro_use]
extern crate log;

use std::time::Instant;

use common::ReservoirComputer;
use dialoguer::{theme::ColorfulTheme, Select};
use lin_reg::TikhonovRegularization;
use nalgebra::{DMatrix, DVector};
use reservoir::{
    Reservoir, ReservoirComputingModel, ReservoirComputingReadout, ReservoirHyperparameters,
};
use time_series_generator::generate_sine_wave;

const TRAIN_LEN: usize = 600;
const N_SYNCHRONIZE: usize = 50;
const FORECAST_LEN: usize = 100;
const SEED: u64 = 0;

pub(crate) fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let hyperparameters = match std::env::args().nth(1) {
        Some(path) => ReservoirHyperparameters::from_file(path)?,
        None => ReservoirHyperparameters {
            input_coupling_scaling: 0.5,
            ..ReservoirHyperparameters::new(1, 300, 0.95, 0.9, 0.0).with_seed(SEED)
        },
    };
    info!("hyperparameters: {:?}", hyperparameters);

    let mut values: Vec<f64> = generate_sine_wave(100);
    values.append(&mut values.clone());
    values.append(&mut values.clone());
    values.append(&mut values.clone());
    info!("got {} datapoints", values.len());
    let values = DMatrix::from_vec(values.len(), 1, values);

    let readouts = vec!["linear", "square half of the hidden state"];
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select readout")
        .items(&readouts)
        .default(0)
        .interact()?;

    let reservoir = Reservoir::from_seed(hyperparameters)?;
    let readout = ReservoirComputingReadout::new(TikhonovRegularization::new(1e-6), choice == 1);
    let mut model =
        ReservoirComputingModel::new(vec!["sine".into()], vec!["sine".into()], reservoir, readout);

    // the state after value t predicts value t + 1
    let t0 = Instant::now();
    model.train(
        &values.rows(0, TRAIN_LEN - 1).into_owned(),
        &values.rows(1, TRAIN_LEN - 1).into_owned(),
        N_SYNCHRONIZE,
    )?;
    info!("training done in: {}ms", t0.elapsed().as_millis());

    let dir = tempfile::tempdir()?;
    model.dump(dir.path())?;

    let forecast = run_forecast(&mut model)?;
    info!("forecast rmse: {}", rmse(&forecast, &values));

    let mut loaded: ReservoirComputingModel<TikhonovRegularization> =
        ReservoirComputingModel::load(dir.path())?;
    let sync: Vec<DVector<f64>> =
        (0..TRAIN_LEN - 1).map(|i| values.row(i).transpose()).collect();
    loaded.synchronize(&sync)?;
    let reloaded_forecast = run_forecast(&mut loaded)?;

    if forecast == reloaded_forecast {
        info!("reloaded model reproduces the forecast");
    } else {
        warn!("reloaded model diverges, rmse {}", rmse(&reloaded_forecast, &values));
    }

    Ok(())
}

fn run_forecast(
    model: &mut ReservoirComputingModel<TikhonovRegularization>,
) -> reservoir::Result<Vec<f64>> {
    (0..FORECAST_LEN).map(|_| model.autonomous_step().map(|pred| pred[0])).collect()
}

/// The first forecast value is the training target of the last time step
fn rmse(forecast: &[f64], values: &DMatrix<f64>) -> f64 {
    let sq_err: f64 = forecast
        .iter()
        .enumerate()
        .map(|(i, pred)| (pred - values[(TRAIN_LEN - 1 + i, 0)]).powi(2))
        .sum();
    (sq_err / forecast.len() as f64).sqrt()
}
