use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hbbtv_inspector::constants::{SNIFF_PACKET_COUNT, TS_PACKET_SIZE};
use hbbtv_inspector::packet::{TsPacketIter, sniff};
use hbbtv_inspector::report::Reporter;
use hbbtv_inspector::{AitWatchdog, InspectorConfig, PacketProcessor};
use tokio::io::AsyncReadExt;

/// Packets per read
const READ_PACKETS: usize = 348;

#[derive(Parser)]
#[command(name = "hbbtv-inspector", about = "Find the HbbTV application URL in an MPEG-TS capture")]
struct Opt {
    /// Transport stream file to scan
    #[clap(long)]
    input: PathBuf,

    /// Give up looking for an AIT after this many seconds
    #[clap(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Accept AIT sections on any PID, not only those announced in a PMT
    #[clap(long, default_value_t = false)]
    any_pid: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opt = Opt::parse();

    let config = InspectorConfig {
        ait_timeout: Duration::from_secs(opt.timeout_secs),
        ait_on_any_pid: opt.any_pid,
        ..Default::default()
    };
    let mut processor = PacketProcessor::new(config);

    let mut file = tokio::fs::File::open(&opt.input)
        .await
        .with_context(|| format!("opening {}", opt.input.display()))?;

    let timed_out = Arc::new(AtomicBool::new(false));
    let mut watchdog = AitWatchdog::new();
    {
        let timed_out = Arc::clone(&timed_out);
        watchdog.arm(processor.config().ait_timeout, move || {
            timed_out.store(true, Ordering::Release);
        })?;
    }

    let mut buf = vec![0u8; TS_PACKET_SIZE * READ_PACKETS];
    let mut carry: Vec<u8> = Vec::with_capacity(buf.len() + TS_PACKET_SIZE);
    let mut sniffed = false;

    'read: loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        carry.extend_from_slice(&buf[..n]);

        if !sniffed {
            if carry.len() < TS_PACKET_SIZE * SNIFF_PACKET_COUNT {
                continue;
            }
            anyhow::ensure!(
                sniff(&carry),
                "{} does not look like an MPEG transport stream",
                opt.input.display()
            );
            sniffed = true;
        }

        let mut iter = TsPacketIter::new(&carry);
        for chunk in iter.by_ref() {
            if !processor.process_packet(chunk).is_empty() && watchdog.settle() {
                break 'read;
            }
        }
        carry = iter.remainder().to_vec();

        if timed_out.load(Ordering::Acquire) {
            break;
        }
        tokio::task::yield_now().await;
    }
    watchdog.disarm();

    anyhow::ensure!(sniffed, "{} is too short to be a transport stream", opt.input.display());

    let source = opt.input.display().to_string();
    println!("{}", Reporter::generate_json_report(&processor, Some(&source)));
    Ok(())
}
