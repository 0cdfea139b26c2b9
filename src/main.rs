use clap::{arg, value_parser, Command};
use colored::Colorize;
use rand::{rngs::StdRng, SeedableRng};

mod charts;
mod constants;
mod data;
mod history;
mod neural_net;
mod qlearning;
mod types;
mod utils;

use crate::{
    constants::{files, COIN, COINS, NUM_ACTIONS, STATE_WIDTH},
    data::historical::{build_dataset, get_historical_data},
    history::episode::EpisodeHistory,
    neural_net::{
        create::{create_network_pair, QNetwork},
        LEARNING_RATE,
    },
    qlearning::{evaluate::evaluate_performance, train::DoubleQTrainer, TrainConfig},
    utils::create_folder_if_not_exists,
};

fn main() -> anyhow::Result<()> {
    let matches = Command::new("coin_trading_bot")
        .about("Double Q-learning trading agent for historical coin prices")
        .subcommand_required(true)
        .subcommand(
            Command::new("train")
                .about("Train on a coin's price history")
                .arg(
                    arg!(--coin <NAME> "Coin dataset to train on")
                        .required(false)
                        .default_value(COIN),
                )
                .arg(
                    arg!(--seed <SEED> "Fixed rng seed for a reproducible run")
                        .required(false)
                        .value_parser(value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("eval")
                .about("Greedy rollout of saved weights over a coin's price history")
                .arg(
                    arg!(--coin <NAME> "Coin dataset to evaluate on")
                        .required(false)
                        .default_value(COIN),
                )
                .arg(arg!(--weights <PATH> "Weights file to load").required(false)),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub)) => {
            let coin = sub.get_one::<String>("coin").unwrap();
            let seed = sub.get_one::<u64>("seed").copied();

            train(coin, seed)
        }
        Some(("eval", sub)) => {
            let coin = sub.get_one::<String>("coin").unwrap();
            let weights = match sub.get_one::<String>("weights") {
                Some(path) => path.clone(),
                None => format!("{}/{coin}.bin", files::WEIGHTS_PATH),
            };

            eval(coin, &weights)
        }
        _ => unreachable!(),
    }
}

fn train(coin: &str, seed: Option<u64>) -> anyhow::Result<()> {
    let time = std::time::Instant::now();

    if !COINS.contains(&coin) {
        println!(
            "{}",
            format!(
                "no bundled dataset for {coin}, expecting {}/{coin}_price.csv",
                files::DATA_PATH
            )
            .yellow()
        );
    }

    let bars = get_historical_data(coin)?;
    let dataset = build_dataset(&bars);
    println!(
        "Training on {coin} with {} timesteps",
        dataset.features.len()
    );

    let config = TrainConfig {
        seed,
        ..TrainConfig::default()
    };

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (predict, update) = create_network_pair(
        STATE_WIDTH,
        config.hidden_units,
        NUM_ACTIONS,
        LEARNING_RATE,
        &mut rng,
    );

    let mut trainer = DoubleQTrainer::new(predict, update, config);
    let report = trainer.train(&dataset.features, &dataset.normalized)?;

    report.meta.record();

    if let Some(episode) = report.episodes.last() {
        episode.record_to_path(&format!("{}/final", files::TRAINING_PATH), &dataset.closes);
    }

    // Save the freshest network for later evaluation; after the final swap
    // that is the predict handle
    create_folder_if_not_exists(files::WEIGHTS_PATH);
    let (predict, _) = trainer.into_networks();
    predict.write_to_file(&format!("{}/{coin}.bin", files::WEIGHTS_PATH))?;

    let last_eval = report.meta.eval_rewards.last().copied().unwrap_or(0.);
    println!(
        "{}",
        format!("Final evaluation reward: {last_eval:.4}").green()
    );
    println!("Completed training in {} seconds", time.elapsed().as_secs());

    Ok(())
}

fn eval(coin: &str, weights_path: &str) -> anyhow::Result<()> {
    let bars = get_historical_data(coin)?;
    let dataset = build_dataset(&bars);

    let network = QNetwork::from_file(weights_path)?;
    let config = TrainConfig::default();

    let evaluation = evaluate_performance(
        &dataset.features,
        &dataset.normalized,
        &network,
        &config,
    )?;

    println!("[Eval] final state: {}", evaluation.market);
    println!(
        "{}",
        format!("[Eval] total reward: {:.4}", evaluation.total_reward).green()
    );

    let episode = EpisodeHistory::from_market(
        &evaluation.market,
        evaluation.cash.clone(),
        evaluation.rewards.clone(),
    );
    episode.record_to_path(&format!("{}/eval", files::TRAINING_PATH), &dataset.closes);

    Ok(())
}
