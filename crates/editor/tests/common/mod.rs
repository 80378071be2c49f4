#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::broadcast;

use lexcms_client::{InMemoryPagesApi, PagesApi};
use lexcms_core::content::ContentBlock;
use lexcms_core::locale::Localized;
use lexcms_core::page::PageContent;
use lexcms_core::permissions::CapabilitySet;
use lexcms_editor::{EditorConfig, EditorSession, Notice, NoticeBus};

pub const SLUG: &str = "home";

/// The home page with a single bilingual hero block, saved once.
pub fn hero_page() -> PageContent {
    let mut page = PageContent::new(SLUG);
    page.title = Localized::new(Some("Home".into()), Some("الرئيسية".into()));
    page.content_blocks = vec![ContentBlock::text("hero_title", "Welcome", "أهلاً")];
    page.version = Some(1);
    page
}

pub fn seeded_api() -> Arc<InMemoryPagesApi> {
    let api = InMemoryPagesApi::new().with_actor("sara");
    api.insert_page(hero_page());
    Arc::new(api)
}

pub fn capabilities(list: &[&str]) -> CapabilitySet {
    list.iter().copied().collect()
}

pub struct Harness {
    pub api: Arc<InMemoryPagesApi>,
    pub session: EditorSession,
    pub notices: broadcast::Receiver<Notice>,
}

impl Harness {
    /// Everything published since the last call.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            out.push(notice);
        }
        out
    }
}

pub async fn open(api: Arc<InMemoryPagesApi>, permissions: CapabilitySet) -> Harness {
    open_with_config(api, permissions, EditorConfig::default()).await
}

pub async fn open_with_config(
    api: Arc<InMemoryPagesApi>,
    permissions: CapabilitySet,
    config: EditorConfig,
) -> Harness {
    let bus = NoticeBus::default();
    let notices = bus.subscribe();
    let session = EditorSession::open(
        SLUG,
        api.clone() as Arc<dyn PagesApi>,
        Arc::new(permissions),
        bus,
        &config,
    )
    .await
    .expect("session should open");
    Harness {
        api,
        session,
        notices,
    }
}

/// Manual saves only, for tests that count requests.
pub fn without_autosave() -> EditorConfig {
    EditorConfig {
        autosave_enabled: false,
        ..EditorConfig::default()
    }
}
