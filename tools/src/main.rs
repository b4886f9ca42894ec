//! civic-runner: headless driver for the complaint engine.
//!
//! Usage:
//!   civic-runner --db civic.db --data-dir ./data              (print dashboard)
//!   civic-runner --db civic.db --data-dir ./data --ipc-mode   (JSON lines on stdin)
//!
//! IPC mode reads one command per line, e.g.
//!   {"cmd":"auto_assign","complaint_id":"cmp-..."}
//! and writes one JSON reply per line.

use anyhow::Result;
use civic_core::{
    command::{self, EngineCommand},
    config::EngineConfig,
    engine::ComplaintEngine,
    stats::DashboardStats,
    store::CivicStore,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = arg_value(&args, "--db").unwrap_or("civic.db");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let city = arg_value(&args, "--city");

    let config = EngineConfig::load(data_dir)?;
    let store = CivicStore::open_with_timeout(
        db,
        Duration::from_millis(config.store.busy_timeout_ms),
    )?;
    store.migrate()?;

    if !ipc_mode {
        println!("civic-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  selection: {:?}", config.assignment.selection);
        println!();
    }

    let engine = ComplaintEngine::build(config, store)?;

    if ipc_mode {
        run_ipc_loop(&engine)?;
    } else {
        let stats = engine.dashboard(city)?;
        print_summary(&stats);
    }
    engine.shutdown();
    Ok(())
}

fn run_ipc_loop(engine: &ComplaintEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: EngineCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        if let EngineCommand::Quit = cmd {
            break;
        }

        let name = cmd.name();
        let reply = match command::execute(engine, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{name} failed: {e}");
                serde_json::json!({ "error": e.public_message() })
            }
        };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(stats: &DashboardStats) {
    println!("=== DASHBOARD ===");
    if let Some(city) = &stats.city_scope {
        println!("  city:            {city}");
    }
    println!("  generated at:    {}", stats.generated_at.to_rfc3339());
    println!("  total:           {}", stats.status.total);
    println!("  pending:         {}", stats.status.pending);
    println!("  delayed:         {}", stats.status.delayed);
    println!("  assigned:        {}", stats.status.assigned);
    println!("  in progress:     {}", stats.status.in_progress);
    println!("  resolved:        {}", stats.status.resolved);
    println!("  resolution rate: {:.1}%", stats.resolution_rate);
    if let Some(hours) = stats.mean_resolution_hours {
        println!("  mean time to resolve: {hours:.1} h");
    }

    println!();
    println!("=== TOP CITIES ===");
    if stats.top_cities.is_empty() {
        println!("  (no complaints yet)");
    }
    for c in &stats.top_cities {
        println!("  {:<20} {}", c.city_name, c.count);
    }

    println!();
    println!("=== CATEGORIES ===");
    for c in &stats.trending_categories {
        println!("  {:<20} {}", c.category, c.count);
    }

    println!();
    println!("=== WEEKLY COHORTS ===");
    for w in &stats.weekly_cohorts {
        println!(
            "  week of {} | filed: {:>4} | resolved: {:>4}",
            w.week_start, w.total_complaints, w.resolved_complaints
        );
    }

    if let Some(top) = &stats.top_reporter {
        println!();
        println!(
            "Top reporter this week: {} ({}) with {} complaints",
            top.citizen_name, top.masked_phone, top.complaint_count
        );
    }

    if !stats.recently_resolved.is_empty() {
        println!();
        println!("=== RECENTLY RESOLVED ===");
        for r in &stats.recently_resolved {
            println!(
                "  {} | {} | {}",
                r.reference_number,
                r.category,
                r.resolved_at.to_rfc3339()
            );
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
