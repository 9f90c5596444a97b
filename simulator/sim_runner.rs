// Simulation Runner - Load and execute topology YAML files
//
// Usage:
//   cargo run --bin sim_runner simulator/scenarios/lte_attach.yaml
//   cargo run --bin sim_runner simulator/scenarios/  (runs all .yaml files in directory)
//   cargo run --bin sim_runner simulator/scenarios/lte_attach.yaml --seed 0x1234...
//
// Exit code 0 on completion, 1 on configuration-load failure.

use std::env;
use std::fs;
use std::path::Path;

use log::info;
use simple_logger::SimpleLogger;

use lte_sim::{SimCore, SimTime, TopologyConfig, TraceEvent, TraceSink};
use lte_sim::sim_interface::DeviceId;

/// Trace sink that prints every dispatched event to the console
struct ConsoleTraceSink;

impl TraceSink for ConsoleTraceSink {
    fn log(&mut self, time: SimTime, device: DeviceId, event: TraceEvent) {
        // Format: time_us device event_type event_details
        let time_us = time / 1_000;

        match event {
            TraceEvent::AttachRequested { ue, enb, attempt } => {
                println!(
                    "{:>10} {:>4} AttachRequested  ue:{} enb:{} attempt:{}",
                    time_us, device, ue, enb, attempt
                );
            }
            TraceEvent::RrcRequestSent { ue, enb } => {
                println!(
                    "{:>10} {:>4} RrcRequestSent   ue:{} enb:{}",
                    time_us, device, ue, enb
                );
            }
            TraceEvent::BearerStateChange {
                bearer,
                from_state,
                to_state,
            } => {
                println!(
                    "{:>10} {:>4} StateChange      bearer:{} {} -> {}",
                    time_us, device, bearer, from_state, to_state
                );
            }
            TraceEvent::AttachFailed { bearer, attempt } => {
                println!(
                    "{:>10} {:>4} AttachFailed     bearer:{} attempt:{}",
                    time_us, device, bearer, attempt
                );
            }
            TraceEvent::TransmitStarted { source, bytes } => {
                println!(
                    "{:>10} {:>4} TransmitStarted  source:{} bytes:{}",
                    time_us, device, source, bytes
                );
            }
            TraceEvent::PayloadDelivered {
                source,
                destination,
                bytes,
            } => {
                println!(
                    "{:>10} {:>4} PayloadDelivered {} -> {} bytes:{}",
                    time_us, device, source, destination, bytes
                );
            }
            TraceEvent::PayloadDropped {
                source,
                bytes,
                reason,
            } => {
                println!(
                    "{:>10} {:>4} PayloadDropped   source:{} bytes:{} reason:{:?}",
                    time_us, device, source, bytes, reason
                );
            }
        }
    }
}

fn main() {
    SimpleLogger::new().init().unwrap();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <topology.yaml | directory/> [--seed SEED_HEX]", args[0]);
        eprintln!("\nExamples:");
        eprintln!("  {} simulator/scenarios/lte_attach.yaml", args[0]);
        eprintln!("  {} simulator/scenarios/", args[0]);
        eprintln!("  {} simulator/scenarios/lte_attach.yaml --seed 0x123456...", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    // Parse optional seed override
    let seed: Option<String> = if args.len() >= 4 && args[2] == "--seed" {
        Some(args[3].clone())
    } else {
        None
    };

    if path.is_file() {
        run_topology_file(path, seed.as_deref());
    } else if path.is_dir() {
        run_topology_directory(path, seed.as_deref());
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

fn run_topology_directory(dir: &Path, seed: Option<&str>) {
    let mut scenarios = Vec::new();

    // Find all .yaml files
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("yaml")
                || path.extension().and_then(|s| s.to_str()) == Some("yml")
            {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_topology_file(scenario_path, seed);
    }

    println!("\nAll scenarios complete.");
}

fn run_topology_file(path: &Path, seed: Option<&str>) {
    println!("Loading topology from: {}", path.display());

    let mut config = TopologyConfig::from_path(path).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", path.display(), e);
        std::process::exit(1);
    });

    if let Some(seed) = seed {
        config.seed = Some(seed.to_string());
        if let Err(e) = config.validate() {
            eprintln!("Invalid seed override: {}", e);
            std::process::exit(1);
        }
    }

    if let Some(ref name) = config.meta.name {
        println!("\nScenario: {}", name);
    }
    if let Some(ref desc) = config.meta.description {
        println!("{}", desc);
    }

    println!("\nConfiguration:");
    println!("  Nodes: {}", config.nodes.len());
    println!("  Channels: {}", config.channels.len());
    println!("  Scheduled actions: {}", config.schedule.len());
    println!("  Attach delay: {} ms", config.lte.attach_delay_ms);
    println!("  Stop time: {} ms", config.stop_time_ms);
    println!("\nStarting simulation...\n");

    let core = SimCore::with_sink(&config, Box::new(ConsoleTraceSink)).unwrap_or_else(|e| {
        eprintln!("Failed to build simulation: {}", e);
        std::process::exit(1);
    });

    match core.run() {
        Ok(report) => {
            report.print_summary();
            info!("scenario complete");
        }
        Err(e) => {
            eprintln!("Simulation aborted: {}", e);
            std::process::exit(1);
        }
    }
}
