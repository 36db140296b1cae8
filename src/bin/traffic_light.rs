// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 车流量信号灯: 视频流 → YOLOv8 车辆计数 → 串口下发红黄绿时长

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use traffic_light_rs::models::{resolve_model, YOLOv8Config};
use traffic_light_rs::pipeline::check_interrupt;
use traffic_light_rs::renderer::window::WindowSink;
use traffic_light_rs::{
    Annotator, Args, ControlError, Detector, HeadlessSink, LoopPolicy, SerialDevice, StreamSource,
    TimingConfig, TrafficController, VehicleClasses, YoloDetector, YOLOv8,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

type Controller = TrafficController<StreamSource, YoloDetector<YOLOv8>, SerialDevice>;

/// 找不到 --font 时依次尝试的系统字体
const FALLBACK_FONTS: [&str; 3] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("traffic_light_rs=info,traffic_light=info,ort=warn")),
        )
        .init();

    let args = Args::parse();

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupt.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
            warn!("⚠️ 无法注册 Ctrl-C 处理: {}", e);
        }
    }

    let controller = match build(&args, interrupt) {
        Ok(controller) => controller,
        Err(e) => {
            if let Some(ControlError::Interrupted(stage)) = e.downcast_ref::<ControlError>() {
                info!("🛑 启动时收到中断信号 ({}), 退出", stage);
                return;
            }
            error!("❌ 启动失败: {:#}", e);
            std::process::exit(1);
        }
    };

    let failed = if args.headless {
        pollster::block_on(run_headless(controller))
    } else {
        run_window(controller, args.quit_key)
    };
    if failed {
        std::process::exit(1);
    }
}

/// 串口 → 模型 → 视频流, 任一失败都直接退出; 每一步之后检查 Ctrl-C
fn build(args: &Args, interrupt: Arc<AtomicBool>) -> Result<Controller> {
    let timing = match &args.timing {
        Some(path) => TimingConfig::load(path),
        None => TimingConfig::default(),
    };

    let device = SerialDevice::open(&args.port, args.baud, args.serial_timeout(), args.settle())?;
    check_interrupt(&interrupt, "serial")?;

    let model_path = resolve_model(&args.model, args.model_url.as_deref())?;
    check_interrupt(&interrupt, "model download")?;
    let model = YOLOv8::new(YOLOv8Config::from_args(args, model_path))
        .context("检测模型加载失败")?;
    let detector = YoloDetector::new(model);
    let vehicles = VehicleClasses::resolve(detector.labels(), &args.vehicle_classes)?;
    info!("🚗 车辆类别 id: {:?}", vehicles.ids().collect::<Vec<_>>());
    check_interrupt(&interrupt, "model")?;

    let source = StreamSource::open(&args.source, args.read_timeout())?;

    Ok(TrafficController::new(source, detector, device, vehicles)
        .with_annotator(load_annotator(&args.font))
        .with_timing(timing)
        .with_policy(LoopPolicy::from_args(args))
        .with_interrupt(interrupt))
}

fn load_annotator(font: &Path) -> Annotator {
    let candidates = std::iter::once(font.to_path_buf()).chain(FALLBACK_FONTS.iter().map(PathBuf::from));
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match Annotator::from_font_file(&path) {
            Ok(annotator) => {
                info!("🔤 字体: {}", path.display());
                return annotator;
            }
            Err(e) => warn!("⚠️ {:#}", e),
        }
    }
    warn!("⚠️ 未找到可用字体, 画面不显示车辆数");
    Annotator::new(None)
}

async fn run_headless(mut controller: Controller) -> bool {
    let mut sink = HeadlessSink::new();
    report(controller.run(&mut sink).await)
}

fn run_window(mut controller: Controller, quit_key: char) -> bool {
    let failed = Arc::new(AtomicBool::new(false));
    let flag = failed.clone();
    macroquad::Window::from_config(WindowSink::conf(), async move {
        let mut sink = match WindowSink::new(quit_key) {
            Ok(sink) => sink,
            Err(e) => {
                error!("❌ {:#}", e);
                controller.release();
                flag.store(true, Ordering::SeqCst);
                return;
            }
        };
        if report(controller.run(&mut sink).await) {
            flag.store(true, Ordering::SeqCst);
        }
    });
    failed.load(Ordering::SeqCst)
}

/// 记录结果, 返回是否失败
fn report(result: Result<traffic_light_rs::LoopStats, traffic_light_rs::ControlError>) -> bool {
    match result {
        Ok(stats) => {
            info!("👋 已退出, 最后一帧车辆数 {}", stats.last_count);
            false
        }
        Err(e) => {
            error!("❌ {:#}", anyhow::Error::new(e));
            true
        }
    }
}
