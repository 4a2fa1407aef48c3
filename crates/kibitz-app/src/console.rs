//! 콘솔 어댑터.
//!
//! 표준 입력 한 줄 명령을 스케줄러, 수동 트리거, 영역 선택기 호출로 변환한다.
//! 주 창은 [`ConsoleWindow`]가 상태만 추적하는 형태로 대신한다.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use kibitz_core::config::TriggerConfig;
use kibitz_core::config_manager::ConfigManager;
use kibitz_core::error::CoreError;
use kibitz_core::models::capture_mode::CaptureMode;
use kibitz_core::models::cycle::CycleReport;
use kibitz_core::models::region::Point;
use kibitz_core::ports::capture::ScreenCapturer;
use kibitz_core::ports::cycle::CaptureModeProvider;
use kibitz_core::ports::window::{WindowController, WindowState};
use kibitz_network::ai_vision_client::RemoteVisionAnalyzer;
use kibitz_storage::diary::DiaryFileStorage;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::chat::UserChat;
use crate::event_bus::{AppEvent, EventBus};
use crate::lifecycle::LifecycleManager;
use crate::mode_store::CaptureModeStore;
use crate::scheduler::{ManualTrigger, MonitorScheduler};
use crate::selector::{RegionSelector, SelectionOutcome, SelectionSession};

/// `preview` 기본 저장 파일 (임시 디렉토리)
const PREVIEW_FILE: &str = "kibitz-preview.png";

pub const HELP: &str = "\
명령: start | stop | now | status | full | select
      down X Y | move X Y | up X Y | esc
      preview [PNG경로] | say 메시지
      trigger 확률(0-100) 침묵초 | ping | help | quit
      diary | diary read YYYY-MM-DD | diary export YYYY-MM-DD 경로";

/// 콘솔 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Now,
    Status,
    Full,
    Select,
    Down(Point),
    Move(Point),
    Up(Point),
    Esc,
    Trigger(TriggerConfig),
    /// 선택 영역 캡처 미리보기 (저장 경로 지정 가능)
    Preview(Option<PathBuf>),
    /// 사용자 대화
    Say(String),
    Diary,
    DiaryRead(String),
    DiaryExport(String, PathBuf),
    Ping,
    Help,
    Quit,
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::Validation {
        field: "command".to_string(),
        message: message.into(),
    }
}

fn parse_point<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<Point, CoreError> {
    let (Some(x), Some(y), None) = (args.next(), args.next(), args.next()) else {
        return Err(invalid("좌표 두 개(X Y)가 필요합니다"));
    };
    let x = x.parse().map_err(|_| invalid(format!("잘못된 X 좌표: {x}")))?;
    let y = y.parse().map_err(|_| invalid(format!("잘못된 Y 좌표: {y}")))?;
    Ok(Point::new(x, y))
}

fn parse_trigger<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<TriggerConfig, CoreError> {
    let (Some(p), Some(t), None) = (args.next(), args.next(), args.next()) else {
        return Err(invalid("확률과 침묵 시간(초)이 필요합니다"));
    };
    let probability: u8 = p
        .parse()
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| invalid(format!("확률은 0-100: {p}")))?;
    let silence: u64 = t
        .parse()
        .ok()
        .filter(|t| *t > 0)
        .ok_or_else(|| invalid(format!("침묵 시간은 1초 이상: {t}")))?;
    Ok(TriggerConfig {
        random_probability_percent: probability,
        silence_timeout_secs: silence,
    })
}

/// `diary`, `diary read D`, `diary export D PATH` (경로는 줄 끝까지)
fn parse_diary(rest: &str) -> Result<Command, CoreError> {
    let (sub, args) = split_head(rest);
    match sub.to_ascii_lowercase().as_str() {
        "" => Ok(Command::Diary),
        "read" => match args.split_whitespace().collect::<Vec<_>>().as_slice() {
            [date] => Ok(Command::DiaryRead(date.to_string())),
            _ => Err(invalid("diary read YYYY-MM-DD")),
        },
        "export" => {
            let (date, dest) = split_head(args);
            if date.is_empty() || dest.is_empty() {
                return Err(invalid("diary export YYYY-MM-DD 경로"));
            }
            Ok(Command::DiaryExport(date.to_string(), PathBuf::from(dest)))
        }
        other => Err(invalid(format!("알 수 없는 diary 명령: {other}"))),
    }
}

/// 첫 단어와 나머지(앞뒤 공백 제거)로 분리
fn split_head(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    }
}

impl FromStr for Command {
    type Err = CoreError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (head, rest) = split_head(line);
        let mut parts = rest.split_whitespace();
        let command = match head.to_ascii_lowercase().as_str() {
            "" => return Err(invalid("빈 명령")),
            "start" => Command::Start,
            "stop" => Command::Stop,
            "now" => Command::Now,
            "status" => Command::Status,
            "full" => Command::Full,
            "select" => Command::Select,
            "down" => return parse_point(parts).map(Command::Down),
            "move" => return parse_point(parts).map(Command::Move),
            "up" => return parse_point(parts).map(Command::Up),
            "esc" => Command::Esc,
            "trigger" => return parse_trigger(parts).map(Command::Trigger),
            "preview" if rest.is_empty() => Command::Preview(None),
            "preview" => return Ok(Command::Preview(Some(PathBuf::from(rest)))),
            "say" if rest.is_empty() => return Err(invalid("say 뒤에 메시지가 필요합니다")),
            "say" => return Ok(Command::Say(rest.to_string())),
            "diary" => return parse_diary(rest),
            "ping" => Command::Ping,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(invalid(format!("알 수 없는 명령: {other}"))),
        };
        if parts.next().is_some() {
            return Err(invalid(format!("{head}: 인자가 필요 없습니다")));
        }
        Ok(command)
    }
}

/// 콘솔용 주 창: 가시성과 최상위 여부만 추적
pub struct ConsoleWindow {
    state: Mutex<WindowState>,
}

impl ConsoleWindow {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WindowState {
                visible: true,
                topmost: true,
            }),
        }
    }
}

impl Default for ConsoleWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowController for ConsoleWindow {
    fn state(&self) -> WindowState {
        *self.state.lock()
    }

    fn hide_for_overlay(&self) {
        let mut state = self.state.lock();
        debug!(from = ?*state, "주 창 숨김 (오버레이)");
        state.visible = false;
        state.topmost = false;
    }

    fn restore(&self, saved: WindowState) {
        let mut state = self.state.lock();
        debug!(to = ?saved, "주 창 복원");
        *state = saved;
    }
}

/// 이벤트 한 줄 표현
pub fn format_event(event: &AppEvent) -> String {
    match event {
        AppEvent::CycleReported(CycleReport::Success { kind, text, .. }) => {
            format!("💬 ({kind}) {text}")
        }
        AppEvent::CycleReported(CycleReport::Failure { kind, reason, .. }) => {
            format!("⚠️  ({kind}) 분석 실패: {reason}")
        }
        AppEvent::ModeChanged(mode) => format!("캡처 모드: {mode}"),
        AppEvent::SelectionFinished(SelectionOutcome::Completed(g)) => {
            format!("영역 선택 완료: {g}")
        }
        AppEvent::SelectionFinished(SelectionOutcome::Cancelled(reason)) => {
            format!("영역 선택 취소 ({reason})")
        }
        AppEvent::SchedulerStateChanged { running: true } => "모니터링 시작".to_string(),
        AppEvent::SchedulerStateChanged { running: false } => "모니터링 정지".to_string(),
    }
}

/// 명령 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

impl Reply {
    fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}

/// 콘솔 명령 처리기
pub struct Console {
    scheduler: Arc<MonitorScheduler>,
    manual: ManualTrigger,
    selector: RegionSelector,
    session: Mutex<Option<SelectionSession>>,
    mode_store: Arc<CaptureModeStore>,
    bus: Arc<EventBus>,
    lifecycle: Arc<LifecycleManager>,
    tick_interval: Duration,
    config: Option<ConfigManager>,
    diary: Option<Arc<DiaryFileStorage>>,
    remote: Option<Arc<RemoteVisionAnalyzer>>,
    chat: Option<Arc<UserChat>>,
    capturer: Option<Arc<dyn ScreenCapturer>>,
}

impl Console {
    pub fn new(
        scheduler: Arc<MonitorScheduler>,
        manual: ManualTrigger,
        selector: RegionSelector,
        mode_store: Arc<CaptureModeStore>,
        bus: Arc<EventBus>,
        lifecycle: Arc<LifecycleManager>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            manual,
            selector,
            session: Mutex::new(None),
            mode_store,
            bus,
            lifecycle,
            tick_interval,
            config: None,
            diary: None,
            remote: None,
            chat: None,
            capturer: None,
        }
    }

    /// 설정 영속화 연결
    pub fn with_config(mut self, config: ConfigManager) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_diary(mut self, diary: Arc<DiaryFileStorage>) -> Self {
        self.diary = Some(diary);
        self
    }

    /// `ping` 대상 분석기
    pub fn with_remote(mut self, remote: Arc<RemoteVisionAnalyzer>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_chat(mut self, chat: Arc<UserChat>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// `preview`용 캡처러
    pub fn with_capturer(mut self, capturer: Arc<dyn ScreenCapturer>) -> Self {
        self.capturer = Some(capturer);
        self
    }

    /// 한 줄 입력 처리. 빈 줄은 무시.
    pub async fn handle_line(&self, line: &str) -> Option<Reply> {
        if line.trim().is_empty() {
            return None;
        }
        match line.parse::<Command>() {
            Ok(command) => Some(self.execute(command).await),
            Err(e) => Some(Reply::text(format!("{e}\n{HELP}"))),
        }
    }

    /// 명령 실행
    pub async fn execute(&self, command: Command) -> Reply {
        match command {
            Command::Start => self.start(),
            Command::Stop => {
                if self.scheduler.stop() {
                    self.bus
                        .publish(AppEvent::SchedulerStateChanged { running: false });
                    Reply::text("정지됨")
                } else {
                    Reply::text("이미 정지 상태")
                }
            }
            Command::Now => match self.manual.fire_now() {
                Ok(_) => Reply::text("분석 요청됨"),
                Err(CoreError::Busy) => Reply::text("분석이 진행 중입니다. 잠시 후 다시 시도하세요"),
                Err(e) => Reply::text(format!("요청 실패: {e}")),
            },
            Command::Status => Reply::Text(self.status()),
            Command::Full => {
                if let Err(e) = self.mode_store.switch_to_full_screen() {
                    warn!("전체 화면 전환 저장 실패: {e}");
                }
                self.bus.publish(AppEvent::ModeChanged(CaptureMode::FullScreen));
                Reply::text("전체 화면 모드")
            }
            Command::Select => self.begin_selection(),
            Command::Down(p) => self.with_session(|s| s.pointer_down(p)),
            Command::Move(p) => self.with_session(|s| s.pointer_move(p)),
            Command::Up(p) => self.with_session(|s| s.pointer_up(p)),
            Command::Esc => self.with_session(|s| s.cancel()),
            Command::Trigger(trigger) => self.set_trigger(trigger),
            Command::Preview(dest) => self.preview(dest).await,
            Command::Say(message) => self.say(&message).await,
            Command::Diary => self.list_diary().await,
            Command::DiaryRead(date_key) => self.read_diary(&date_key).await,
            Command::DiaryExport(date_key, dest) => self.export_diary(&date_key, dest).await,
            Command::Ping => self.ping().await,
            Command::Help => Reply::text(HELP),
            Command::Quit => {
                self.lifecycle.shutdown();
                Reply::Quit
            }
        }
    }

    /// 종료 처리: 스케줄러 정지, 열린 선택 세션 폐기
    pub fn close(&self) {
        self.scheduler.stop();
        if let Some(session) = self.session.lock().take() {
            info!("열린 선택 세션 종료");
            drop(session);
        }
    }

    pub fn start(&self) -> Reply {
        if self.scheduler.start(self.tick_interval) {
            self.bus
                .publish(AppEvent::SchedulerStateChanged { running: true });
            Reply::text("시작됨")
        } else {
            Reply::text("이미 실행 중")
        }
    }

    fn status(&self) -> String {
        let state = self.scheduler.snapshot();
        let trigger = self.scheduler.trigger_config();
        format!(
            "실행: {} | 분석 중: {} | 마지막 발화: {}초 전 | 모드: {} | 확률 {}% / 침묵 {}초 | 선택 중: {}",
            if state.running { "예" } else { "아니오" },
            if state.in_flight { "예" } else { "아니오" },
            state.last_fire.elapsed().as_secs(),
            self.mode_store.current_mode(),
            trigger.random_probability_percent,
            trigger.silence_timeout_secs,
            if self.selector.is_active() { "예" } else { "아니오" },
        )
    }

    fn begin_selection(&self) -> Reply {
        let mode_store = self.mode_store.clone();
        let bus = self.bus.clone();
        let on_finish = Box::new(move |outcome: SelectionOutcome| {
            if let SelectionOutcome::Completed(region) = outcome {
                if let Err(e) = mode_store.switch_to_region(region) {
                    warn!("영역 전환 실패: {e}");
                }
                bus.publish(AppEvent::ModeChanged(mode_store.current_mode()));
            }
            bus.publish(AppEvent::SelectionFinished(outcome));
        });

        match self.selector.begin(on_finish) {
            Ok(session) => {
                *self.session.lock() = Some(session);
                Reply::text("영역 선택 중: down X Y → move X Y → up X Y (esc 취소)")
            }
            Err(_) => Reply::text("이미 영역 선택 중입니다"),
        }
    }

    /// 열린 세션에 포인터 이벤트 전달. 끝난 세션은 정리한다.
    fn with_session(&self, f: impl FnOnce(&mut SelectionSession)) -> Reply {
        let mut slot = self.session.lock();
        let Some(session) = slot.as_mut() else {
            return Reply::text("열린 선택 세션이 없습니다 (select)");
        };
        f(session);
        if session.is_finished() {
            *slot = None;
            return Reply::text("선택 종료");
        }
        match session.preview() {
            Some((a, b)) => Reply::Text(format!("({},{}) → ({},{})", a.x, a.y, b.x, b.y)),
            None => Reply::text("대기 중"),
        }
    }

    fn set_trigger(&self, trigger: TriggerConfig) -> Reply {
        self.scheduler.set_trigger_config(trigger);
        if let Some(config) = &self.config {
            if let Err(e) = config.update_with(|c| c.trigger = trigger) {
                warn!("발화 정책 저장 실패: {e}");
            }
        }
        Reply::Text(format!(
            "발화 정책: 확률 {}% / 침묵 {}초 (다음 틱부터)",
            trigger.random_probability_percent, trigger.silence_timeout_secs
        ))
    }

    async fn list_diary(&self) -> Reply {
        let Some(diary) = &self.diary else {
            return Reply::text("일기 기록이 꺼져 있습니다");
        };
        match diary.list_dates().await {
            Ok(dates) if dates.is_empty() => Reply::text("일기 없음"),
            Ok(dates) => Reply::Text(format!(
                "{} ({})",
                dates.join(", "),
                diary.base_dir().display()
            )),
            Err(e) => Reply::text(format!("일기 목록 실패: {e}")),
        }
    }

    async fn read_diary(&self, date_key: &str) -> Reply {
        let Some(diary) = &self.diary else {
            return Reply::text("일기 기록이 꺼져 있습니다");
        };
        match diary.read(date_key).await {
            Ok(content) => Reply::Text(format!("[{date_key}]\n{}", content.trim_end())),
            Err(CoreError::NotFound { .. }) => Reply::Text(format!("{date_key} 일기 없음")),
            Err(e) => Reply::text(format!("일기 읽기 실패: {e}")),
        }
    }

    async fn export_diary(&self, date_key: &str, dest: PathBuf) -> Reply {
        let Some(diary) = &self.diary else {
            return Reply::text("일기 기록이 꺼져 있습니다");
        };
        match diary.export(date_key, &dest).await {
            Ok(bytes) => Reply::Text(format!(
                "{date_key} 일기 내보냄: {} ({bytes} bytes)",
                dest.display()
            )),
            Err(CoreError::NotFound { .. }) => Reply::Text(format!("{date_key} 일기 없음")),
            Err(e) => Reply::text(format!("일기 내보내기 실패: {e}")),
        }
    }

    async fn say(&self, message: &str) -> Reply {
        let Some(chat) = &self.chat else {
            return Reply::text("대화 기능을 사용할 수 없습니다");
        };
        match chat.send(message).await {
            Ok(reply) => Reply::Text(format!("AI: {}", reply.trim())),
            Err(e) => Reply::text(format!("대화 실패: {e}")),
        }
    }

    /// 선택 영역을 캡처해 PNG로 저장하고 경계/크기를 보여준다
    async fn preview(&self, dest: Option<PathBuf>) -> Reply {
        let CaptureMode::Region(region) = self.mode_store.current_mode() else {
            return Reply::text("선택된 영역이 없습니다 (select)");
        };
        let Some(capturer) = self.capturer.clone() else {
            return Reply::text("화면 캡처를 사용할 수 없습니다");
        };

        let captured =
            tokio::task::spawn_blocking(move || capturer.capture(CaptureMode::Region(region)))
                .await
                .map_err(|e| CoreError::Internal(format!("캡처 태스크 실패: {e}")));
        let image = match captured {
            Ok(Ok(image)) => image,
            Ok(Err(e)) | Err(e) => return Reply::text(format!("미리보기 실패: {e}")),
        };

        let dest = dest.unwrap_or_else(|| std::env::temp_dir().join(PREVIEW_FILE));
        if let Err(e) = tokio::fs::write(&dest, &image.png).await {
            return Reply::text(format!("미리보기 저장 실패: {e}"));
        }
        debug!(path = %dest.display(), bytes = image.png.len(), "미리보기 저장");

        Reply::Text(format!(
            "({},{})-({},{}) {}x{} → {}",
            region.x,
            region.y,
            region.right(),
            region.bottom(),
            region.width,
            region.height,
            dest.display()
        ))
    }

    async fn ping(&self) -> Reply {
        let Some(remote) = &self.remote else {
            return Reply::text("비전 API가 설정되지 않았습니다");
        };
        match remote.check_connection().await {
            Ok(()) => Reply::text("비전 API 연결 정상"),
            Err(e) => Reply::text(format!("비전 API 연결 실패: {e}")),
        }
    }
}
