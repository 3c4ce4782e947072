//! Hoverlens demo host.
//!
//! Wires the real pipeline (settings store, Gemini client, image
//! acquisition) and stands in for a hosting page by translating stdin
//! commands into hover events. Useful for poking the state machine against
//! a live API key.

use std::sync::Arc;

use anyhow::Result;
use providers::GeminiClient;
use services::acquisition::{ImageAcquisition, NativeSurfaceLoader};
use services::credentials::CredentialProvider;
use services::settings_store::SettingsStore;
use shared::events::{HoverEvent, HoverTarget, Rect, Viewport};
use tokio::io::AsyncBufReadExt;

mod cancel;
mod clipboard;
mod hover;
mod tooltip;

use clipboard::SystemClipboard;
use hover::HoverRouter;

const USAGE: &str = "commands:\n  \
    enter <url> <x> <y> <width> <height>\n  \
    leave\n  tooltip-enter\n  tooltip-leave\n  copy\n  state\n  quit";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let store = SettingsStore::open_default();
    let credentials = CredentialProvider::new(store);
    let router = HoverRouter::new(
        credentials,
        Arc::new(ImageAcquisition::new(Arc::new(NativeSurfaceLoader::new()))),
        Arc::new(GeminiClient::new()),
        Arc::new(SystemClipboard::new()),
        // Stand-in viewport for the demo; a real host reports its own.
        Viewport { width: 1280.0, height: 800.0, scroll_x: 0.0, scroll_y: 0.0 },
    );

    println!("hoverlens demo\n{USAGE}");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut next_id: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["enter", url, x, y, width, height] => {
                let rect = match parse_rect(x, y, width, height) {
                    Some(rect) => rect,
                    None => {
                        println!("enter: x/y/width/height must be numbers");
                        continue;
                    }
                };
                next_id += 1;
                router
                    .handle_event(HoverEvent::PointerEnter(HoverTarget {
                        id: next_id,
                        image_url: url.to_string(),
                        rect,
                    }))
                    .await;
            }
            ["leave"] => router.handle_event(HoverEvent::PointerLeave).await,
            ["tooltip-enter"] => router.handle_event(HoverEvent::TooltipPointerEnter).await,
            ["tooltip-leave"] => router.handle_event(HoverEvent::TooltipPointerLeave).await,
            ["copy"] => router.handle_event(HoverEvent::CopyRequested).await,
            ["state"] => {}
            ["quit"] | ["exit"] => break,
            [] => continue,
            _ => {
                println!("{USAGE}");
                continue;
            }
        }
        print_snapshot(&router);
    }
    Ok(())
}

fn parse_rect(x: &str, y: &str, width: &str, height: &str) -> Option<Rect> {
    Some(Rect {
        x: x.parse().ok()?,
        y: y.parse().ok()?,
        width: width.parse().ok()?,
        height: height.parse().ok()?,
    })
}

fn print_snapshot(router: &HoverRouter) {
    let tooltip = router.tooltip();
    let tooltip = tooltip.lock();
    println!(
        "tooltip: {:?} opacity={:.1} placement={:?}",
        tooltip.state(),
        tooltip.opacity(),
        tooltip.placement()
    );
    if !tooltip.text().is_empty() {
        println!("--\n{}\n--", tooltip.text());
    }
}
