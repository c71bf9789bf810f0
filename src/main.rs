//! Zip-Code Sensor Index - Main Daemon
//!
//! A server-side daemon that continuously:
//! 1. Builds the zip-code -> sensor mapping from the PurpleAir listing
//! 2. Publishes each build as an atomic generation in PostgreSQL
//! 3. Serves concurrent zip resolutions from an in-memory snapshot
//! 4. Rebuilds whenever the serving generation goes stale
//!
//! The SMS/web layer and the live reading clients are separate
//! services; they consume this daemon's index, not the other way
//! around.
//!
//! Usage:
//!   cargo run --release                    # Start daemon without HTTP endpoint
//!   cargo run --release -- --endpoint 8080 # Start with operator endpoint on port 8080
//!   cargo run --release -- --once          # Run a single rebuild cycle and exit
//!
//! Environment:
//!   DATABASE_URL       - PostgreSQL connection string
//!   PURPLEAIR_API_KEY  - PurpleAir read key for the sensor listing

use airq_index::daemon::Daemon;
use airq_index::endpoint;
use std::env;

fn main() {
    println!("🌫️  Zip-Code Sensor Index");
    println!("==========================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut endpoint_port: Option<u16> = None;
    let mut run_once = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--endpoint" => {
                if i + 1 < args.len() {
                    endpoint_port = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    eprintln!("Error: --endpoint requires a port number");
                    std::process::exit(1);
                }
            }
            "--once" => {
                run_once = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--endpoint PORT] [--once]", args[0]);
                std::process::exit(1);
            }
        }
    }

    // Create daemon with default configuration
    let mut daemon = Daemon::new();

    // Initialize: validate database, load registry, recover generation
    println!("📊 Initializing daemon...");
    if let Err(e) = daemon.initialize() {
        eprintln!("\n❌ Initialization failed: {}\n", e);
        std::process::exit(1);
    }
    println!("✓ Daemon initialized ({} zip codes)\n", daemon.zip_count());

    // Report the state of whatever generation we recovered
    println!("📋 Checking generation freshness...");
    match daemon.check_staleness() {
        None => println!("   No generation published yet (initial build needed)"),
        Some(age) => {
            if daemon.needs_rebuild() {
                println!("   Serving generation is {} hours old (stale)", age.num_hours());
            } else {
                println!("   Serving generation is fresh ({} min old)", age.num_minutes());
            }
        }
    }
    println!();

    // Single-cycle mode for cron-style operation
    if run_once {
        println!("📥 Running one rebuild cycle...");
        match daemon.rebuild() {
            Ok(report) => {
                println!(
                    "✓ Generation {} published: {} of {} records valid ({} dropped), {} zips mapped\n",
                    report.generation_id,
                    report.valid,
                    report.fetched,
                    report.drops.total(),
                    report.zips_mapped
                );
                return;
            }
            Err(e) => {
                eprintln!("\n❌ Rebuild failed: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    // Start operator endpoint if requested (in background thread)
    if let Some(port) = endpoint_port {
        println!("🚀 Starting operator endpoint...");
        let index = daemon.index();
        std::thread::spawn(move || {
            if let Err(e) = endpoint::start_endpoint_server(port, index) {
                eprintln!("❌ Endpoint server error: {}", e);
            }
        });
    }

    // Run the main rebuild loop
    println!("🔄 Starting continuous rebuild loop...");
    println!("   Press Ctrl+C to stop\n");

    if let Err(e) = daemon.run() {
        eprintln!("\n❌ Daemon error: {}", e);
        std::process::exit(1);
    }
}
