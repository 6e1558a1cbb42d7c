use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use datachat::chart::ResolvedChart;
use datachat::config::Config;
use datachat::dataset::Dataset;
use datachat::export;
use datachat::llm::GatewayClient;
use datachat::orchestrator::Orchestrator;
use datachat::session::Session;

#[derive(Parser)]
#[command(name = "datachat", version, about = "Chat with a CSV dataset and get charts back")]
struct Args {
    /// CSV file to analyze
    csv: PathBuf,

    /// Directory for exported decks
    #[arg(long, default_value = "export")]
    export_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datachat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let dataset = Dataset::from_csv_path(&args.csv)?;
    let stats = dataset.stats();
    println!(
        "Loaded {}: {} rows, {} columns ({} missing values, {} duplicate rows)",
        args.csv.display(),
        stats.total_rows,
        stats.total_columns,
        stats.missing_values,
        stats.duplicate_rows
    );
    println!("Columns: {}", dataset.column_names().join(", "));

    let orchestrator = Orchestrator::new(
        GatewayClient::from_config(&config.llm),
        config.llm.model.clone(),
        config.llm.max_tokens,
        config.llm.temperature,
    );
    let mut session = Session::new(dataset);

    println!();
    println!("Suggested prompts:");
    println!("  - Give me an overview of this dataset");
    println!("  - What are the key trends in this data?");
    println!("  - What are the main data quality issues?");
    println!("Commands: :overview :logs :clear-logs :export :quit");
    println!();

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = stdin.lock().lines().next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            ":quit" | ":q" => break,
            ":overview" => {
                let answer = orchestrator.overview(&mut session).await;
                println!("{answer}");
            }
            ":logs" => {
                if session.log.is_empty() {
                    println!("No logs yet. Start chatting with your data.");
                }
                for entry in session.log.read_all() {
                    println!("[{}] {}", entry.timestamp.format("%Y-%m-%d %H:%M:%S"), entry.prompt);
                    println!("  -> {}", entry.response.replace('\n', "\n     "));
                    if let Some(directives) = &entry.directives {
                        println!("  directives: {directives}");
                    }
                }
            }
            ":clear-logs" => {
                session.log.clear();
                println!("Logs cleared.");
            }
            ":export" => {
                let deck = export::build_deck(session.conversation())?;
                let manifest = deck.save(&args.export_dir)?;
                println!(
                    "Exported {} slides ({} charts) to {}",
                    deck.slides.len(),
                    deck.image_count(),
                    manifest.display()
                );
            }
            prompt => {
                let (answer, charts) = orchestrator.ask(prompt, &mut session).await;
                println!("{answer}");
                for (idx, chart) in charts.iter().enumerate() {
                    match write_chart(chart, &config.export.chart_dir, idx) {
                        Ok(path) => println!("[chart saved: {}]", path.display()),
                        Err(e) => println!("[chart '{}' could not be saved: {e}]", chart.title),
                    }
                }
            }
        }
    }

    info!("Session ended");
    Ok(())
}

fn write_chart(chart: &ResolvedChart, dir: &str, idx: usize) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = PathBuf::from(dir).join(format!(
        "chart_{}_{idx}.png",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    chart.write_png(&path)?;
    Ok(path)
}
