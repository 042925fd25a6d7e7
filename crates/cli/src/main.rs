use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::report::{self, InspectReport};
use fallacy_core::analysis::{self, Schema};
use fallacy_core::config::{self, AppConfig};
use fallacy_core::{loader, pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("loading config")?;

    match cli.command {
        Commands::Inspect { data, json } => run_inspect(&cfg, data.as_deref(), json),
        Commands::Train {
            data,
            holdout,
            top_terms,
            json,
        } => run_train(&cfg, data.as_deref(), holdout, top_terms, json),
        Commands::Predict { text, data, json } => run_predict(&cfg, data.as_deref(), &text, json),
        Commands::Search {
            query,
            data,
            topk,
            fields,
            json,
        } => run_search(&cfg, data.as_deref(), &query, topk, &fields, json).await,
    }
}

#[derive(Parser)]
#[command(name = "fallacy")]
#[command(about = "Fallacy example classification and similarity search", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report dataset schema, label balance and text lengths
    Inspect {
        /// JSONL dataset (defaults to data.path from config)
        #[arg(long)]
        data: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Fit the TF-IDF classifier and evaluate it
    Train {
        /// JSONL dataset (defaults to data.path from config)
        #[arg(long)]
        data: Option<String>,
        /// Fraction of each label held out for evaluation; 0 evaluates on training data
        #[arg(long, default_value_t = 0.0)]
        holdout: f64,
        /// Show this many highest-weighted terms per label
        #[arg(long, default_value_t = 0)]
        top_terms: usize,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Fit the classifier on the dataset and label new texts
    Predict {
        /// Text to classify (repeatable)
        #[arg(long, required = true, num_args = 1..)]
        text: Vec<String>,
        /// JSONL dataset (defaults to data.path from config)
        #[arg(long)]
        data: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Find the dataset examples most similar to a query
    Search {
        /// Query text to embed and search
        query: String,
        /// JSONL dataset (defaults to data.path from config)
        #[arg(long)]
        data: Option<String>,
        /// Number of results (defaults to retrieval.top_k from config)
        #[arg(short = 'k', long)]
        topk: Option<usize>,
        /// Restrict result fields (comma-separated), e.g. text,label,score
        #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
        fields: Vec<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn run_inspect(cfg: &AppConfig, data: Option<&str>, json: bool) -> Result<()> {
    let path = data.unwrap_or(&cfg.data.path);
    let examples = loader::read_examples(path).with_context(|| format!("reading {}", path))?;
    let schema = if examples.is_empty() {
        Schema::default()
    } else {
        Schema::infer(
            &examples,
            cfg.data.text_key.as_deref(),
            cfg.data.label_key.as_deref(),
        )?
    };
    let report = InspectReport {
        sanity: analysis::sanity_report(&examples, &schema),
        length_stats: analysis::length_stats_by_label(&examples, &schema),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render_inspect(&report));
    }
    Ok(())
}

fn run_train(
    cfg: &AppConfig,
    data: Option<&str>,
    holdout: f64,
    top_terms: usize,
    json: bool,
) -> Result<()> {
    if !(0.0..1.0).contains(&holdout) {
        anyhow::bail!("--holdout must be in [0, 1), got {}", holdout);
    }
    let records = pipeline::load_records(cfg, data).context("loading dataset")?;
    let (model, summary) = pipeline::train_and_evaluate(cfg, &records, holdout)?;

    let mut terms = Vec::new();
    if top_terms > 0 {
        for label in &summary.fit.labels {
            let top = model
                .top_terms(label, top_terms)?
                .into_iter()
                .map(|(t, _)| t)
                .collect::<Vec<_>>();
            terms.push((label.clone(), top));
        }
    }

    if json {
        let mut out = serde_json::to_value(&summary)?;
        if let Some(obj) = out.as_object_mut() {
            if !terms.is_empty() {
                let map: serde_json::Map<String, serde_json::Value> = terms
                    .iter()
                    .map(|(l, t)| (l.clone(), serde_json::json!(t)))
                    .collect();
                obj.insert("top_terms".into(), serde_json::Value::Object(map));
            }
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", report::render_training(&summary, &terms));
    }
    Ok(())
}

fn run_predict(cfg: &AppConfig, data: Option<&str>, texts: &[String], json: bool) -> Result<()> {
    let records = pipeline::load_records(cfg, data).context("loading dataset")?;
    let mut model = fallacy_core::classifier::ClassifierPipeline::from_config(cfg);
    model.fit(&records)?;
    let report = model.classify(texts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render_classification(&report));
    }
    Ok(())
}

async fn run_search(
    cfg: &AppConfig,
    data: Option<&str>,
    query: &str,
    topk: Option<usize>,
    fields: &[String],
    json: bool,
) -> Result<()> {
    let records = pipeline::load_records(cfg, data).context("loading dataset")?;
    let engine = pipeline::build_engine(cfg, &records)
        .await
        .context("building retrieval index")?;
    let result = engine
        .query(query, topk.unwrap_or(cfg.retrieval.top_k))
        .await?;
    if json {
        let out = report::retrieval_json(&result, engine.model(), fields)?;
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", report::render_retrieval(&result));
    }
    Ok(())
}
