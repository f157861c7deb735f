//! Demonstration harness: drives the orchestrator over a directory of
//! red packets in step order, printing one line per step. Ambient
//! tooling, not a product surface — no HTTP, no metrics, no promotion.
//!
//! Usage: `run_stream <config.json> <red_packets_dir>`
//!
//! `red_packets_dir` holds one `<step_counter>.json`-named red packet
//! per step; they are processed in ascending numeric order and written
//! under `<out_root>/step_<step_counter>/`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use witness_kernel::config::StreamConfig;
use witness_kernel::merkle::genesis_root;
use witness_kernel::orchestrator::StepOrchestrator;
use witness_kernel::types::RedPacket;

fn main() {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| {
        eprintln!("usage: run_stream <config.json> <red_packets_dir>");
        std::process::exit(2);
    });
    let packets_dir = args.next().unwrap_or_else(|| {
        eprintln!("usage: run_stream <config.json> <red_packets_dir>");
        std::process::exit(2);
    });

    if let Err(e) = run(&config_path, &packets_dir) {
        eprintln!("run_stream failed: {e}");
        std::process::exit(1);
    }
}

fn run(config_path: &str, packets_dir: &str) -> Result<(), witness_kernel::KernelError> {
    let config_json = std::fs::read_to_string(config_path)?;
    let config = StreamConfig::from_json_str(&config_json)?;
    let signing_key = config.signing_key()?;

    let skills: BTreeMap<String, _> = config.skills.iter().cloned().map(|s| (s.name.clone(), s)).collect();
    let mut orchestrator =
        StepOrchestrator::new(config.contracts.clone(), skills, config.global_seed, config.state_vocab.clone());

    let mut packet_files: Vec<PathBuf> = std::fs::read_dir(packets_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    packet_files.sort();

    let out_root = PathBuf::from(&config.out_root);
    let mut prev_chain_root = genesis_root();

    for packet_path in packet_files {
        let packet_json = std::fs::read_to_string(&packet_path)?;
        let red_packet: RedPacket = serde_json::from_str(&packet_json)?;
        let step_dir = out_root.join(format!("step_{:04}", red_packet.step_counter));

        let bundle = orchestrator.run_step(&red_packet, &prev_chain_root, &step_dir)?;

        if let Some(key) = &signing_key {
            let sig = witness_kernel::signer::sign_merkle_root(key, &bundle.merkle_root);
            std::fs::write(step_dir.join("root.sig"), sig)?;
        }

        println!(
            "step {} action={} verdict={} merkle_root={}",
            bundle.step_counter, bundle.selected_action, bundle.verdict, bundle.merkle_root
        );
        prev_chain_root = bundle.chain_root;
    }

    Ok(())
}
