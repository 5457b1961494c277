use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use intervene_rs::config::AppConfig;
use intervene_rs::embedding::openai::EmbeddingClient;
use intervene_rs::jsonl::{read_jsonl, write_jsonl};
use intervene_rs::llm::openai::LlmClient;
use intervene_rs::types::{EvaluationResult, QaRecord, SummaryRecord};
use intervene_rs::{evaluation, generation, judge, scoring, ConsistencyChecker, InterventionGenerator};

#[derive(Parser)]
#[command(name = "intervene", version, about = "Counterfactual interventions on clinical QA data")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
    /// TOML config; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Where stage outputs are written unless --output-file is given
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,
    /// Overrides [llm].model
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Cmd {
    /// End-to-end: generate -> intervene -> evaluate
    Run {
        #[arg(long)]
        input_file: PathBuf,
        #[arg(long)]
        output_file: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Summaries -> QA records
    Generate {
        #[arg(long)]
        input_file: PathBuf,
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
    /// QA records -> QA records with an intervened summary
    Intervene {
        #[arg(long)]
        input_file: PathBuf,
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
    /// QA records -> evaluation results
    Evaluate {
        #[arg(long)]
        input_file: PathBuf,
        #[arg(long)]
        output_file: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// QA records with reference answers -> judge verdicts
    Judge {
        #[arg(long)]
        input_file: PathBuf,
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
    /// Evaluation results -> summary statistics on stdout
    Score {
        #[arg(long)]
        input_file: PathBuf,
    },
}

fn output_path(explicit: Option<PathBuf>, data_dir: &Path, stage: &str) -> PathBuf {
    explicit.unwrap_or_else(|| data_dir.join(format!("{stage}.jsonl")))
}

fn checker(cfg: &AppConfig, threshold: Option<f32>) -> Result<ConsistencyChecker> {
    let threshold = threshold.unwrap_or(cfg.checker.threshold);
    let answerer = Arc::new(LlmClient::from_config(&cfg.llm)?);
    let embedder = Arc::new(EmbeddingClient::from_config(&cfg.embedding, &cfg.llm)?);
    Ok(ConsistencyChecker::new(answerer, embedder, cfg.answering.params()).with_threshold(threshold)?)
}

async fn generate(cfg: &AppConfig, input: &Path) -> Result<Vec<QaRecord>> {
    let summaries: Vec<SummaryRecord> = read_jsonl(input)?;
    let llm = LlmClient::from_config(&cfg.llm)?;
    let params = cfg.generation.params();
    Ok(generation::generate_dataset(&llm, &summaries, &params, cfg.generation.max_fraction).await)
}

fn intervene(cfg: &AppConfig, mut records: Vec<QaRecord>) -> Result<Vec<QaRecord>> {
    let mut generator = InterventionGenerator::from_config(&cfg.intervention)?;
    for rec in records.iter_mut() {
        generator.intervene_record(rec);
    }
    Ok(records)
}

async fn evaluate(
    cfg: &AppConfig,
    records: Vec<QaRecord>,
    threshold: Option<f32>,
) -> Result<Vec<EvaluationResult>> {
    let checker = checker(cfg, threshold)?;
    let mut generator = InterventionGenerator::from_config(&cfg.intervention)?;
    Ok(evaluation::evaluate_all(&checker, &mut generator, records).await)
}

fn save<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<()> {
    write_jsonl(path, records)?;
    info!(path = %path.display(), records = records.len(), "results saved");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => AppConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(model) = cli.model {
        cfg.llm.model = model;
    }

    match cli.cmd {
        Cmd::Run { input_file, output_file, threshold } => {
            let records = generate(&cfg, &input_file).await?;
            save(&cli.data_dir.join("generate.jsonl"), &records)?;
            let records = intervene(&cfg, records)?;
            save(&cli.data_dir.join("intervene.jsonl"), &records)?;
            let results = evaluate(&cfg, records, threshold).await?;
            save(&output_path(output_file, &cli.data_dir, "evaluate"), &results)?;
        }
        Cmd::Generate { input_file, output_file } => {
            let records = generate(&cfg, &input_file).await?;
            save(&output_path(output_file, &cli.data_dir, "generate"), &records)?;
        }
        Cmd::Intervene { input_file, output_file } => {
            let records = intervene(&cfg, read_jsonl(&input_file)?)?;
            save(&output_path(output_file, &cli.data_dir, "intervene"), &records)?;
        }
        Cmd::Evaluate { input_file, output_file, threshold } => {
            let results = evaluate(&cfg, read_jsonl(&input_file)?, threshold).await?;
            save(&output_path(output_file, &cli.data_dir, "evaluate"), &results)?;
        }
        Cmd::Judge { input_file, output_file } => {
            let records: Vec<QaRecord> = read_jsonl(&input_file)?;
            let llm = LlmClient::from_config(&cfg.llm)?;
            let verdicts = judge::judge_all(&llm, &records, &cfg.judge.params()).await;
            save(&output_path(output_file, &cli.data_dir, "judge"), &verdicts)?;
        }
        Cmd::Score { input_file } => {
            let results: Vec<EvaluationResult> = read_jsonl(&input_file)?;
            let summary = scoring::score_results(&results);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
