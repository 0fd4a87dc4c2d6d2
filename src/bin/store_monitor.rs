use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
/// 门店客流与订单统计
///
/// 主程序入口 - 直接运行: cargo run --bin store-monitor --release -- --synthetic --script demo.json
use mimalloc::MiMalloc;
use store_monitor_rs::config::DetectorSettings;
use store_monitor_rs::systems::follow;
use store_monitor_rs::{gen_time_string, Settings, StoreMonitor};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 门店监控程序
#[derive(Parser, Debug)]
#[command(author, version, about = "多路摄像头门店客流与订单统计", long_about = None)]
struct Args {
    /// 配置文件 (不存在时写入默认配置)
    #[arg(short, long, default_value = "store_monitor.json")]
    config: PathBuf,

    /// 运行时长 (秒),0 表示一直运行
    #[arg(short, long, default_value_t = 0)]
    duration: u64,

    /// 使用检测脚本代替 ONNX 模型
    #[arg(long)]
    script: Option<PathBuf>,

    /// 使用合成空白帧代替图片目录
    #[arg(long)]
    synthetic: bool,

    /// 覆盖配置中的摄像头ID (逗号分隔)
    #[arg(long, value_delimiter = ',')]
    cameras: Vec<String>,

    /// 退出时把最后一份快照写入该目录
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut settings = Settings::load_or_create(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    if let Some(path) = args.script {
        settings.detector = DetectorSettings::Scripted { path };
    }
    if args.synthetic {
        settings.synthetic = true;
    }
    if !args.cameras.is_empty() {
        settings.camera_ids = args.cameras;
    }
    settings.log_summary();

    let mut monitor = StoreMonitor::new(settings).context("failed to initialise store monitor")?;
    let streaming = monitor.start().context("failed to start store monitor")?;
    if streaming == 0 {
        warn!("⚠️ No Camera Detected, publishing empty snapshots");
    }

    // Ctrl-C 只发停止信号,收尾 (停止线程、写快照) 统一在主线程完成
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let snapshots = monitor.board().subscribe(8);
    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    follow(&snapshots, &stop_rx, deadline, |snapshot| -> Result<()> {
        println!("{}", serde_json::to_string(&snapshot)?);
        Ok(())
    })?;

    let last = monitor.shutdown();
    info!(
        "📊 occupancy={} entries={} exits={} coffee={} meal={}",
        last.current_occupancy,
        last.total_entries,
        last.total_exits,
        last.order_counts.coffee,
        last.order_counts.meal
    );

    if let Some(dir) = args.out_dir {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(format!("snapshot_{}.json", gen_time_string("")));
        fs::write(&path, serde_json::to_string_pretty(&last)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("💾 snapshot saved to {}", path.display());
    }
    Ok(())
}
