use anyhow::Context;
use clap::{Parser, Subcommand};
use expense_categorizer::{category_options, ArtifactStore, CategorizerConfig, Pipeline};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file with `description` and `category` columns
    #[arg(long, env = "EXPENSE_CATEGORIZER_DATASET")]
    dataset: Option<PathBuf>,

    /// Directory for the persisted vectorizer and model
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Number of trees in the forest
    #[arg(long)]
    trees: Option<usize>,

    /// Seed for the train/test split and the forest
    #[arg(long)]
    seed: Option<u64>,

    /// Remove cached artifacts before doing anything else
    #[arg(short, long)]
    fresh: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit a new classifier and replace the cached artifacts
    Train,
    /// Suggest a category for each description
    Predict {
        #[arg(required = true)]
        descriptions: Vec<String>,
    },
    /// Show what the current classifier was trained on
    Info,
}

fn build_config(args: &Args) -> anyhow::Result<CategorizerConfig> {
    let mut config = CategorizerConfig::from_env().context("Invalid environment configuration")?;
    if let Some(dataset) = &args.dataset {
        config.dataset_path = dataset.clone();
    }
    if let Some(artifacts) = &args.artifacts {
        config.artifacts_dir = artifacts.clone();
    }
    if let Some(trees) = args.trees {
        config.forest.n_trees = trees;
    }
    if let Some(seed) = args.seed {
        config.forest.seed = seed;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = build_config(&args)?;
    let pipeline = Pipeline::new(config);

    if args.fresh {
        info!("Fresh start requested - removing any cached artifacts...");
        pipeline.store().remove().context("Failed to remove cached artifacts")?;
    }

    let start_time = Instant::now();
    match &args.command {
        Command::Train => {
            let classifier = pipeline.retrain().context("Training failed")?;
            let report = classifier.report();
            println!("Trained on {} examples ({} held out)", report.train_rows, report.test_rows);
            if let Some(accuracy) = report.held_out_accuracy {
                println!("Held-out accuracy: {:.1}%", accuracy * 100.0);
            }
            println!("Categories: {}", report.labels.join(", "));
            info!("Training took {:.2?}", start_time.elapsed());
        }
        Command::Predict { descriptions } => {
            pipeline.get_or_train().context("Could not load or train the classifier")?;
            info!("Classifier ready after {:.2?}", start_time.elapsed());

            for description in descriptions {
                let suggestion = pipeline.predict_category(description);
                match &suggestion {
                    Some(category) => println!("{}: {}", description, category),
                    None => println!("{}: (no suggestion)", description),
                }
                let options = category_options(suggestion.as_deref());
                println!("  options: {}", options.iter()
                    .map(|o| if o.is_empty() { "<choose>" } else { o.as_str() })
                    .collect::<Vec<_>>()
                    .join(" | "));
            }
        }
        Command::Info => {
            let classifier = pipeline.get_or_train().context("Could not load or train the classifier")?;
            let info = classifier.info();
            println!("Categories ({}): {}", info.num_classes, info.class_labels.join(", "));
            println!("Vocabulary size: {}", info.vocabulary_size);
            println!("Trees: {} (seed {})", info.n_trees, info.seed);
            if let Some(accuracy) = info.held_out_accuracy {
                println!("Held-out accuracy: {:.1}%", accuracy * 100.0);
            }
            println!("Training data fingerprint: {}", info.fingerprint);

            let store = pipeline.store();
            for path in [store.vectorizer_path(), store.model_path()] {
                match ArtifactStore::file_digest(&path) {
                    Ok(digest) => println!("{}: sha256 {}", path.display(), digest),
                    Err(e) => println!("{}: unavailable ({})", path.display(), e),
                }
            }
        }
    }

    Ok(())
}
