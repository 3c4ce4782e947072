//! Hover event router: the root of the analysis pipeline.
//!
//! Consumes pointer events from the hosting surface, filters out targets too
//! small to be content, and drives the tooltip controller while running
//! acquisition and analysis as a cancellable background task. Every failure
//! is converted to a display string here; nothing propagates past this
//! boundary into the host.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use providers::ImageAnalyzer;
use services::acquisition::ImageAcquirer;
use services::credentials::CredentialProvider;
use shared::error::AnalysisError;
use shared::events::{HoverEvent, HoverTarget, Viewport};
use shared::settings::validate_api_key;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cancel::{Token, TokenManager};
use crate::clipboard::Clipboard;
use crate::tooltip::TooltipController;

/// Fade-in is delayed slightly so fast re-hovers do not flicker.
const FADE_IN_DELAY: Duration = Duration::from_millis(50);
/// Grace period after pointer-leave before the hide starts.
const HIDE_DEBOUNCE: Duration = Duration::from_millis(300);
const FADE_OUT: Duration = Duration::from_millis(200);
/// How long the "copied" confirmation stays on the copy affordance.
const COPIED_FLASH: Duration = Duration::from_secs(2);

const CREDENTIAL_MESSAGE: &str = "Please set a valid Gemini API key in the extension settings";

/// Session-scoped pipeline context: the tooltip, the live token, and the
/// active target all live here rather than as module state.
struct RouterContext {
    tooltip: Arc<Mutex<TooltipController>>,
    tokens: TokenManager,
    credentials: Arc<CredentialProvider>,
    acquirer: Arc<dyn ImageAcquirer>,
    analyzer: Arc<dyn ImageAnalyzer>,
    clipboard: Arc<dyn Clipboard>,
    viewport: Viewport,
    active: Mutex<Option<HoverTarget>>,
}

#[derive(Clone)]
pub struct HoverRouter {
    ctx: Arc<RouterContext>,
}

impl HoverRouter {
    pub fn new(
        credentials: Arc<CredentialProvider>,
        acquirer: Arc<dyn ImageAcquirer>,
        analyzer: Arc<dyn ImageAnalyzer>,
        clipboard: Arc<dyn Clipboard>,
        viewport: Viewport,
    ) -> Self {
        Self {
            ctx: Arc::new(RouterContext {
                tooltip: Arc::new(Mutex::new(TooltipController::new())),
                tokens: TokenManager::new(),
                credentials,
                acquirer,
                analyzer,
                clipboard,
                viewport,
                active: Mutex::new(None),
            }),
        }
    }

    /// The single tooltip instance this router drives.
    pub fn tooltip(&self) -> Arc<Mutex<TooltipController>> {
        self.ctx.tooltip.clone()
    }

    pub async fn handle_event(&self, event: HoverEvent) {
        match event {
            HoverEvent::PointerEnter(target) => self.on_pointer_enter(target),
            HoverEvent::PointerLeave => self.on_pointer_leave(),
            HoverEvent::TooltipPointerEnter => self.ctx.tooltip.lock().pin(),
            HoverEvent::TooltipPointerLeave => {
                self.ctx.tooltip.lock().unpin();
                self.spawn_hide();
            }
            HoverEvent::CopyRequested => self.on_copy_requested(),
        }
    }

    fn on_pointer_enter(&self, target: HoverTarget) {
        if !target.qualifies() {
            debug!("ignoring hover on {}x{} image", target.rect.width, target.rect.height);
            return;
        }

        *self.ctx.active.lock() = Some(target.clone());
        {
            let mut tooltip = self.ctx.tooltip.lock();
            tooltip.begin_positioning(&target.rect, &self.ctx.viewport);
            tooltip.show_loading();
        }

        let tooltip = self.ctx.tooltip.clone();
        tokio::spawn(async move {
            sleep(FADE_IN_DELAY).await;
            tooltip.lock().reveal();
        });

        // Supersedes any in-flight analysis.
        let token = self.ctx.tokens.issue();
        let router = self.clone();
        tokio::spawn(async move {
            router.run_analysis(target, token).await;
        });
    }

    fn on_pointer_leave(&self) {
        *self.ctx.active.lock() = None;
        self.ctx.tokens.revoke();
        self.spawn_hide();
    }

    fn on_copy_requested(&self) {
        let text = {
            let tooltip = self.ctx.tooltip.lock();
            if !tooltip.copy_visible() {
                return;
            }
            tooltip.text().to_string()
        };

        match self.ctx.clipboard.write_text(&text) {
            Ok(()) => {
                self.ctx.tooltip.lock().set_copied(true);
                let tooltip = self.ctx.tooltip.clone();
                tokio::spawn(async move {
                    sleep(COPIED_FLASH).await;
                    tooltip.lock().set_copied(false);
                });
            }
            // Not surfaced to the user; the tooltip text is still readable.
            Err(e) => warn!("failed to copy analysis text: {e}"),
        }
    }

    async fn run_analysis(&self, target: HoverTarget, token: Token) {
        let Some(outcome) = self.perform_analysis(&target, &token).await else {
            debug!("analysis superseded mid-flight, discarding");
            return;
        };
        if self.ctx.tokens.is_cancelled(&token) {
            debug!("analysis finished after cancellation, discarding result");
            return;
        }

        let mut tooltip = self.ctx.tooltip.lock();
        match outcome {
            Ok(text) => tooltip.show_result(text),
            Err(message) => tooltip.show_error(message),
        }
    }

    /// Acquire then analyze, checking the token after each suspension point.
    /// Returns `None` when superseded, otherwise the display-ready outcome.
    async fn perform_analysis(
        &self,
        target: &HoverTarget,
        token: &Token,
    ) -> Option<Result<String, String>> {
        // Shape-check the credential before any I/O: a bad key must fail
        // without a single network request.
        let credential = self.ctx.credentials.current();
        if validate_api_key(&credential).is_err() {
            return Some(Err(CREDENTIAL_MESSAGE.to_string()));
        }

        let image_base64 = match self.ctx.acquirer.acquire(&target.image_url).await {
            Ok(data) => data,
            Err(e) => return Some(Err(failure_message(&e))),
        };
        if self.ctx.tokens.is_cancelled(token) {
            return None;
        }

        match self.ctx.analyzer.analyze(&image_base64, &credential).await {
            Ok(text) => Some(Ok(text)),
            Err(AnalysisError::Credential(_)) => Some(Err(CREDENTIAL_MESSAGE.to_string())),
            Err(e) => Some(Err(failure_message(&e))),
        }
    }

    fn spawn_hide(&self) {
        let epoch = self.ctx.tooltip.lock().begin_hide();
        let router = self.clone();
        tokio::spawn(async move {
            router.run_hide(epoch).await;
        });
    }

    /// Debounced hide: wait, then bail out if the hide was replaced, the
    /// tooltip is pinned, or some target is hovered again. Otherwise fade
    /// out and hide.
    async fn run_hide(&self, epoch: u64) {
        sleep(HIDE_DEBOUNCE).await;
        {
            let tooltip = self.ctx.tooltip.lock();
            if tooltip.hide_epoch() != epoch || tooltip.pinned() {
                return;
            }
        }
        if self.ctx.active.lock().is_some() {
            return;
        }

        self.ctx.tooltip.lock().start_fade_out();
        sleep(FADE_OUT).await;
        let mut tooltip = self.ctx.tooltip.lock();
        if tooltip.hide_epoch() == epoch {
            tooltip.finish_hide();
        }
    }
}

/// Boundary conversion: every pipeline error becomes one short display
/// string, per the original's tooltip copy.
fn failure_message(err: &dyn std::fmt::Display) -> String {
    format!("Error: {err}. Please try a different image or check your connection.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tooltip::TooltipState;
    use async_trait::async_trait;
    use services::settings_store::SettingsStore;
    use shared::error::AcquisitionError;
    use shared::events::Rect;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VALID_KEY: &str = "AIzaSyExampleKey123x"; // 20 chars

    const CAT_RESULT: &str =
        "A cat on a rug.\n\n© 2025 Falah G. Salieh (فلاح الخفاجي)\nGemini Image Analyzer";

    struct FakeAcquirer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeAcquirer {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail: true })
        }
    }

    #[async_trait]
    impl ImageAcquirer for FakeAcquirer {
        async fn acquire(&self, url: &str) -> Result<String, AcquisitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AcquisitionError::Unavailable);
            }
            // Tag the bytes with the URL so the analyzer can be scripted
            // per image.
            Ok(format!("bytes-of-{url}"))
        }
    }

    /// Outcome per image-bytes tag, with an optional artificial latency.
    struct FakeAnalyzer {
        calls: AtomicUsize,
        script: HashMap<String, (Duration, Result<String, u16>)>,
    }

    impl FakeAnalyzer {
        fn returning(text: &str) -> Arc<Self> {
            let mut script = HashMap::new();
            script.insert(
                "bytes-of-img".to_string(),
                (Duration::ZERO, Ok(text.to_string())),
            );
            Arc::new(Self { calls: AtomicUsize::new(0), script })
        }

        fn scripted(script: Vec<(&str, u64, Result<String, u16>)>) -> Arc<Self> {
            let script = script
                .into_iter()
                .map(|(tag, ms, result)| {
                    (tag.to_string(), (Duration::from_millis(ms), result))
                })
                .collect();
            Arc::new(Self { calls: AtomicUsize::new(0), script })
        }
    }

    #[async_trait]
    impl ImageAnalyzer for FakeAnalyzer {
        async fn analyze(&self, image_base64: &str, api_key: &str) -> Result<String, AnalysisError> {
            validate_api_key(api_key)?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, result) = self
                .script
                .get(image_base64)
                .unwrap_or_else(|| panic!("unscripted image {image_base64}"));
            if !delay.is_zero() {
                sleep(*delay).await;
            }
            result.clone().map_err(|status| AnalysisError::Api {
                status,
                message: "boom".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct FakeClipboard {
        written: Mutex<Vec<String>>,
    }

    impl Clipboard for FakeClipboard {
        fn write_text(&self, text: &str) -> anyhow::Result<()> {
            self.written.lock().push(text.to_string());
            Ok(())
        }
    }

    struct Fixture {
        router: HoverRouter,
        acquirer: Arc<FakeAcquirer>,
        analyzer: Arc<FakeAnalyzer>,
        clipboard: Arc<FakeClipboard>,
        _dir: tempfile::TempDir,
    }

    fn fixture(api_key: &str, acquirer: Arc<FakeAcquirer>, analyzer: Arc<FakeAnalyzer>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_path(dir.path().join("settings.json"));
        store
            .save(&shared::settings::AnalyzerSettings { gemini_api_key: api_key.into() })
            .unwrap();
        let clipboard = Arc::new(FakeClipboard::default());
        let router = HoverRouter::new(
            CredentialProvider::new(store),
            acquirer.clone(),
            analyzer.clone(),
            clipboard.clone(),
            Viewport { width: 1280.0, height: 800.0, scroll_x: 0.0, scroll_y: 0.0 },
        );
        Fixture { router, acquirer, analyzer, clipboard, _dir: dir }
    }

    fn target(id: u64, url: &str, width: f32, height: f32) -> HoverTarget {
        HoverTarget {
            id,
            image_url: url.into(),
            rect: Rect { x: 600.0, y: 100.0, width, height },
        }
    }

    fn state_of(fx: &Fixture) -> TooltipState {
        fx.router.tooltip().lock().state()
    }

    fn text_of(fx: &Fixture) -> String {
        fx.router.tooltip().lock().text().to_string()
    }

    /// Let spawned tasks and timers run under paused time.
    async fn settle(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_images_never_trigger_analysis() {
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 40.0, 200.0))).await;
        fx.router.handle_event(HoverEvent::PointerEnter(target(2, "img", 200.0, 49.0))).await;
        settle(500).await;

        assert_eq!(state_of(&fx), TooltipState::Hidden);
        assert_eq!(fx.acquirer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_hover_shows_result_with_attribution() {
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        assert_eq!(state_of(&fx), TooltipState::Hidden);
        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        // Synchronous part of the transition: positioned and loading, not
        // yet faded in.
        {
            let tooltip = fx.router.tooltip();
            let tooltip = tooltip.lock();
            assert_eq!(tooltip.state(), TooltipState::Loading);
            assert_eq!(tooltip.opacity(), 0.0);
            assert!(tooltip.placement().is_some());
        }

        settle(200).await;
        let tooltip = fx.router.tooltip();
        let tooltip = tooltip.lock();
        assert_eq!(tooltip.state(), TooltipState::ShowingResult);
        assert_eq!(tooltip.opacity(), 1.0);
        assert_eq!(tooltip.text(), CAT_RESULT);
        assert!(tooltip.copy_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_rehover_renders_only_latest_result() {
        let analyzer = FakeAnalyzer::scripted(vec![
            ("bytes-of-first", 500, Ok("First image.".to_string())),
            ("bytes-of-second", 10, Ok("Second image.".to_string())),
        ]);
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), analyzer);

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "first", 200.0, 200.0))).await;
        // Let the first analysis pass its post-acquisition checkpoint.
        settle(1).await;
        fx.router.handle_event(HoverEvent::PointerEnter(target(2, "second", 200.0, 200.0))).await;

        settle(100).await;
        assert_eq!(text_of(&fx), "Second image.");

        // The superseded result resolves later and must not repaint.
        settle(1000).await;
        assert_eq!(text_of(&fx), "Second image.");
        assert_eq!(state_of(&fx), TooltipState::ShowingResult);
        assert_eq!(fx.analyzer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_credential_fails_before_any_io() {
        let fx = fixture("short", FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;

        assert_eq!(state_of(&fx), TooltipState::ShowingError);
        assert_eq!(text_of(&fx), CREDENTIAL_MESSAGE);
        assert!(!fx.router.tooltip().lock().copy_visible());
        assert_eq!(fx.acquirer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.analyzer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_failure_shows_error_string() {
        let fx = fixture(VALID_KEY, FakeAcquirer::failing(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;

        assert_eq!(state_of(&fx), TooltipState::ShowingError);
        assert_eq!(
            text_of(&fx),
            "Error: Failed to load image data. The image might be protected or unavailable. \
             Please try a different image or check your connection."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_failure_shows_error_string() {
        let analyzer = FakeAnalyzer::scripted(vec![("bytes-of-img", 0, Err(500))]);
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), analyzer);

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;

        assert_eq!(state_of(&fx), TooltipState::ShowingError);
        assert_eq!(
            text_of(&fx),
            "Error: API request failed: 500 - boom. \
             Please try a different image or check your connection."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_hides_after_debounce_and_fade() {
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;
        fx.router.handle_event(HoverEvent::PointerLeave).await;

        // Inside the debounce window: still showing.
        settle(250).await;
        assert_eq!(state_of(&fx), TooltipState::ShowingResult);

        // Debounce elapsed: fading but not yet hidden.
        settle(100).await;
        assert_eq!(fx.router.tooltip().lock().opacity(), 0.0);
        assert_eq!(state_of(&fx), TooltipState::ShowingResult);

        // Fade elapsed: hidden.
        settle(250).await;
        assert_eq!(state_of(&fx), TooltipState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hovering_tooltip_within_debounce_keeps_it_open() {
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;
        fx.router.handle_event(HoverEvent::PointerLeave).await;
        settle(100).await;
        fx.router.handle_event(HoverEvent::TooltipPointerEnter).await;

        settle(2000).await;
        assert_ne!(state_of(&fx), TooltipState::Hidden);
        assert_eq!(text_of(&fx), CAT_RESULT);

        // Leaving the tooltip restarts the debounce and the hide completes.
        fx.router.handle_event(HoverEvent::TooltipPointerLeave).await;
        settle(600).await;
        assert_eq!(state_of(&fx), TooltipState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rehover_before_hide_completes_restarts() {
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;
        fx.router.handle_event(HoverEvent::PointerLeave).await;
        settle(100).await;
        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;

        settle(2000).await;
        assert_eq!(state_of(&fx), TooltipState::ShowingResult);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_writes_displayed_text_and_flashes() {
        let fx = fixture(VALID_KEY, FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;
        fx.router.handle_event(HoverEvent::CopyRequested).await;

        assert_eq!(*fx.clipboard.written.lock(), vec![CAT_RESULT.to_string()]);
        assert!(fx.router.tooltip().lock().copied());

        settle(2500).await;
        assert!(!fx.router.tooltip().lock().copied());
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_suppressed_while_showing_error() {
        let fx = fixture("short", FakeAcquirer::new(), FakeAnalyzer::returning(CAT_RESULT));

        fx.router.handle_event(HoverEvent::PointerEnter(target(1, "img", 200.0, 200.0))).await;
        settle(200).await;
        fx.router.handle_event(HoverEvent::CopyRequested).await;

        assert!(fx.clipboard.written.lock().is_empty());
    }
}
