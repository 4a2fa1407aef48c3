//! # kibitz
//!
//! 화면 코멘터리 어시스턴트 바이너리 진입점.
//! DI 와이어링, 라이프사이클 관리, 콘솔 입력 루프.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use kibitz_app::chat::UserChat;
use kibitz_app::console::{format_event, Console, ConsoleWindow, Reply, HELP};
use kibitz_app::cycle::{CycleDeps, CycleGate};
use kibitz_app::event_bus::EventBus;
use kibitz_app::lifecycle::LifecycleManager;
use kibitz_app::mode_store::CaptureModeStore;
use kibitz_app::pipeline::{CaptureAnalyzePipeline, UnconfiguredAnalyzer};
use kibitz_app::report::DiaryReportSink;
use kibitz_app::scheduler::{ManualTrigger, MonitorScheduler};
use kibitz_app::selector::RegionSelector;
use kibitz_core::config_manager::ConfigManager;
use kibitz_core::ports::capture::ScreenCapturer;
use kibitz_core::ports::diary::DiaryStore;
use kibitz_core::ports::vision::VisionAnalyzer;
use kibitz_network::ai_vision_client::RemoteVisionAnalyzer;
use kibitz_storage::diary::DiaryFileStorage;
use kibitz_vision::capture::ScreenCapture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Kibitz 화면 코멘터리 어시스턴트
///
/// 주기적으로 화면(또는 선택 영역)을 캡처해 AI 코멘트를 받아 보여준다.
#[derive(Parser, Debug)]
#[command(name = "kibitz")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 틱 간격 (초). 지정하지 않으면 설정값 사용
    #[arg(long)]
    tick_interval: Option<u64>,

    /// 시작하자마자 모니터링 실행
    #[arg(long, short = 's')]
    start: bool,
}

/// 일기 저장소 생성. 꺼져 있거나 생성에 실패하면 None.
async fn open_diary(enabled: bool, directory: Option<PathBuf>) -> Option<Arc<DiaryFileStorage>> {
    if !enabled {
        info!("일기 기록 비활성화");
        return None;
    }
    let dir = match directory {
        Some(dir) => dir,
        None => match ConfigManager::data_dir() {
            Ok(data) => data.join("diary"),
            Err(e) => {
                warn!("데이터 디렉토리 확인 실패, 일기 비활성화: {e}");
                return None;
            }
        },
    };
    match DiaryFileStorage::new(dir).await {
        Ok(diary) => {
            info!("일기 저장소: {}", diary.base_dir().display());
            Some(Arc::new(diary))
        }
        Err(e) => {
            warn!("일기 저장소 생성 실패, 일기 비활성화: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "kibitz={lvl},kibitz_app={lvl},kibitz_core={lvl},kibitz_vision={lvl},kibitz_network={lvl},kibitz_storage={lvl}",
        lvl = args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("Kibitz 시작");

    // ── 설정 ──
    let config_manager = match args.config {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };
    info!("설정 파일: {}", config_manager.config_path().display());
    let config = config_manager.get().with_env_overrides();
    let tick_interval = args
        .tick_interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.tick_interval());

    // ── 어댑터 생성 (DI 와이어링) ──

    // 1. 화면 캡처
    let capturer: Arc<dyn ScreenCapturer> = Arc::new(ScreenCapture::new());

    // 2. 비전 분석 (API 키가 없으면 매 사이클 설정 에러로 보고)
    let (analyzer, remote): (Arc<dyn VisionAnalyzer>, Option<Arc<RemoteVisionAnalyzer>>) =
        match RemoteVisionAnalyzer::new(&config.vision_api) {
            Ok(remote) => {
                let remote = Arc::new(remote);
                info!("비전 API: {} ({})", config.vision_api.endpoint, config.vision_api.model);
                (remote.clone(), Some(remote))
            }
            Err(e) => {
                warn!("비전 API 미설정: {e}");
                (Arc::new(UnconfiguredAnalyzer::new(e.to_string())), None)
            }
        };

    // 3. 일기
    let diary = open_diary(config.diary.enabled, config.diary.directory.clone()).await;

    // 4. 이벤트 버스 / 라이프사이클 / 주 창
    let bus = Arc::new(EventBus::default());
    let lifecycle = Arc::new(LifecycleManager::new());
    let window = Arc::new(ConsoleWindow::new());

    // 5. 캡처 모드, 파이프라인, 보고
    let mode_store = Arc::new(CaptureModeStore::load(config_manager.clone()));
    let pipeline = Arc::new(CaptureAnalyzePipeline::new(
        capturer.clone(),
        analyzer.clone(),
        config.prompt.clone(),
    ));
    let sink = Arc::new(DiaryReportSink::new(
        diary.clone().map(|d| d as Arc<dyn DiaryStore>),
        bus.clone(),
    ));

    // 6. 스케줄러 + 수동 트리거 (게이트 공유)
    let deps = CycleDeps {
        mode_provider: mode_store.clone(),
        pipeline,
        sink,
    };
    let gate = CycleGate::new(Instant::now());
    let scheduler = Arc::new(MonitorScheduler::new(
        gate.clone(),
        deps.clone(),
        config.trigger,
    ));

    // 7. 사용자 대화 (같은 게이트로 침묵 타이머 재설정)
    let mut chat = UserChat::new(gate.clone(), analyzer, config.prompt.clone());
    if let Some(diary) = &diary {
        chat = chat.with_diary(diary.clone());
    }

    let mut console = Console::new(
        scheduler,
        ManualTrigger::new(gate, deps),
        RegionSelector::new(window),
        mode_store,
        bus.clone(),
        lifecycle.clone(),
        tick_interval,
    )
    .with_config(config_manager)
    .with_chat(Arc::new(chat))
    .with_capturer(capturer);
    if let Some(diary) = diary {
        console = console.with_diary(diary);
    }
    if let Some(remote) = remote {
        console = console.with_remote(remote);
    }

    // ── 태스크 시작 ──

    // 이벤트 출력
    let mut events = bus.subscribe();
    let mut printer_shutdown = lifecycle.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        println!("[{}] {}", Local::now().format("%H:%M:%S"), format_event(&event));
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("이벤트 {skipped}개 누락"),
                    Err(RecvError::Closed) => break,
                },
                _ = printer_shutdown.changed() => break,
            }
        }
    });

    // OS 시그널
    let signal_lifecycle = lifecycle.clone();
    tokio::spawn(async move {
        signal_lifecycle.wait_for_signal().await;
    });

    println!("{HELP}");
    if args.start || config.monitor.auto_start {
        console.start();
    }

    // 콘솔 입력 루프
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shutdown_rx = lifecycle.subscribe();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match console.handle_line(&line).await {
                    Some(Reply::Text(text)) => println!("{text}"),
                    Some(Reply::Quit) => break,
                    None => {}
                },
                Ok(None) => {
                    info!("표준 입력 종료, 시그널 대기 (Ctrl+C로 종료)");
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                    break;
                }
                Err(e) => {
                    warn!("표준 입력 읽기 실패: {e}");
                    break;
                }
            },
            _ = shutdown_rx.changed() => break,
        }
    }

    lifecycle.shutdown();
    console.close();
    info!("Kibitz 종료");
    Ok(())
}
