use camctl_mock_server::{demo_bundle, ServerThread, SimLoop, INBOUND_CAP, OUTBOUND_CAP};
use crossbeam_channel::bounded;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_ADDR: &str = "127.0.0.1:0";

fn parse_arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let addr = parse_arg_value(&args, "--addr")
        .or_else(|| std::env::var("CAMCTL_WS_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let addr_file = parse_arg_value(&args, "--addr-file").map(PathBuf::from);
    let run_for_ms = parse_arg_value(&args, "--run-for-ms")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis);

    let (in_tx, in_rx) = bounded(INBOUND_CAP);
    let (out_tx, out_rx) = bounded(OUTBOUND_CAP);

    let net = match ServerThread::spawn_with_addr(&addr, in_tx, out_rx) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = &addr_file {
        let _ = fs::write(path, net.listen_addr().to_string());
    }

    println!("mock_control_server listening on ws://{}", net.listen_addr());

    let mut sim_loop = SimLoop::new(demo_bundle(), in_rx, out_tx);

    let start = Instant::now();
    loop {
        sim_loop.tick();
        thread::sleep(Duration::from_millis(33));
        if let Some(max) = run_for_ms {
            if start.elapsed() >= max {
                break;
            }
        }
    }

    net.shutdown();
}
