// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::Path;

use binscope::{logging, lookup, BatchEvent, BatchRunner, LookupOutcome, RunMode, Settings};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("lookup") => {
            logging::init_stderr();
            let query = args.get(2).context("usage: binscope lookup <bin>")?;
            run_lookup(query)
        }
        Some("batch") => {
            logging::init_stderr();
            let path = args
                .get(2)
                .context("usage: binscope batch <file> [--enhanced] [--checker]")?;
            let flags = &args[3..];
            let mode = if flags.iter().any(|a| a == "--enhanced") {
                RunMode::Enhanced
            } else {
                RunMode::Standard
            };
            let checker = flags.iter().any(|a| a == "--checker");
            run_batch(Path::new(path), mode, checker)
        }
        Some(other) => bail!("unknown command '{}' (expected: lookup, batch)", other),
        None => run_ui_mode(),
    }
}

fn run_lookup(query: &str) -> Result<()> {
    let settings = Settings::load()?;
    let table = settings.load_bin_table()?;

    match lookup(&table, query) {
        LookupOutcome::Found { record } => {
            println!("✓ BIN {}", record.bin);
            println!("  Brand:    {}", record.brand);
            println!("  Type:     {}", record.card_type);
            println!("  Level:    {}", record.level);
            println!("  Bank:     {}", record.bank);
            println!("  Country:  {}", record.country);
            println!("  Currency: {}", record.currency);
            println!("  Prepaid:  {}", record.prepaid);
        }
        LookupOutcome::NotFound { query } => {
            println!("❌ BIN {} not found in database", query);
        }
        LookupOutcome::Rejected { reason } => {
            eprintln!("❌ {}", reason);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn run_batch(path: &Path, mode: RunMode, checker: bool) -> Result<()> {
    let settings = if checker { Settings::checker() } else { Settings::load()? };

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read items file: {:?}", path))?;
    let items: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if items.is_empty() {
        bail!("no items found in {:?}", path);
    }

    println!("⏱️  Batch run: {} items ({} mode)", items.len(), mode.as_str());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Ticks are strictly serialized, so one thread is all the runner needs
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(async {
        let (mut runner, mut rx) =
            BatchRunner::new(settings.classifier.build(mode), settings.runner_config())?;
        runner.start_in_mode(items, mode)?;

        while let Some(event) = rx.recv().await {
            match &event {
                BatchEvent::Progress { processed, total, result, .. } => {
                    println!("  [{}/{}] {}", processed, total, result.category);
                }
                BatchEvent::Completed { .. } => {
                    println!("\n✅ Completed");
                }
                BatchEvent::Stopped { cursor, .. } => {
                    println!("\n⏹  Stopped after {} items", cursor);
                }
                BatchEvent::Failed { error, .. } => {
                    println!("\n❌ Failed: {}", error);
                }
            }

            if event.is_terminal() {
                break;
            }
        }

        if let Some(summary) = runner.last_summary() {
            println!("✓ {}", summary.summary());
        }

        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(feature = "tui")]
fn run_ui_mode() -> Result<()> {
    logging::init_stderr();
    let settings = Settings::load()?;
    let table = settings.load_bin_table()?;

    // Multi-threaded so the runner keeps ticking while the UI blocks on input
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
        .context("Failed to build tokio runtime")?;
    let _guard = runtime.enter();

    let mut app = ui::App::new(table, settings)?;
    ui::run_ui(&mut app)?;

    println!("✅ Dashboard closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode() -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: binscope lookup <bin> | binscope batch <file>");
    std::process::exit(1);
}
