//! # 表单会话模块
//!
//! ## 设计思路
//!
//! 一个 `FormSession` 对应一次编辑表单的全部瞬时状态：当前选图、预览句柄、
//! 文字、字号、处理结果与加载标志。状态全部是显式字段，不依赖全局可变状态。
//!
//! ## 实现思路
//!
//! - 选图采用“代数计数器”：开始时领取 `SelectionTicket`，提交结果时比对代数，
//!   不一致说明已被更新的选择取代，结果直接丢弃（后写者胜）。
//! - 提交采用“加载标志互斥”：已有请求在途时拒绝新提交，不排队。
//! - 任何失败都会清除对应的加载标志，避免界面卡在“处理中”。
//! - 预览句柄由 `PreviewGuard` 持有，字段被替换或会话结束时自动释放。
//!
//! 会话本身不做 I/O，异步部分由 `OverlayServiceState` 在锁外执行。

use super::preview::{PreviewGuard, PreviewRegistry};
use super::source::{BoundedImage, OverlayRequest, ProcessedImage};
use super::submit::build_request;
use super::OverlayError;

/// 选图凭证，记录开始时的会话代数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket {
    generation: u64,
}

/// 选图结果的落地情况。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// 结果已生效，附带新的预览句柄。
    Applied { preview: String },
    /// 期间有更新的选择，结果已丢弃。
    Superseded,
}

/// 会话状态快照（供展示层/CLI 输出）。
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSnapshot {
    pub image: Option<ImageSummary>,
    pub image_preview: Option<String>,
    pub text: String,
    pub size: String,
    pub processed: Option<ProcessedSummary>,
    pub processed_preview: Option<String>,
    pub is_selecting: bool,
    pub is_submitting: bool,
    pub can_submit: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ImageSummary {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub bytes: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessedSummary {
    pub media_type: String,
    pub bytes: usize,
    pub suggested_file_name: String,
}

/// 单个表单会话。
pub struct FormSession {
    registry: PreviewRegistry,
    generation: u64,
    pending_selection: Option<u64>,
    image: Option<BoundedImage>,
    /// 当前图片落地时的代数。
    image_generation: u64,
    image_preview: Option<PreviewGuard>,
    text: String,
    size: String,
    processed: Option<ProcessedImage>,
    processed_preview: Option<PreviewGuard>,
    /// 在途提交发起时的会话代数。
    submitting: Option<u64>,
}

impl FormSession {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            generation: 0,
            pending_selection: None,
            image: None,
            image_generation: 0,
            image_preview: None,
            text: String::new(),
            size: String::new(),
            processed: None,
            processed_preview: None,
            submitting: None,
        }
    }

    /// 开始一次选图，之前在途的选图随之失效。
    pub fn begin_selection(&mut self) -> SelectionTicket {
        self.generation += 1;
        self.pending_selection = Some(self.generation);
        SelectionTicket {
            generation: self.generation,
        }
    }

    /// 落地选图结果。
    ///
    /// 过期凭证的结果（无论成功失败）一律丢弃并返回 `Superseded`；
    /// 失败时保持原有选图与预览不变。
    pub fn commit_selection(
        &mut self,
        ticket: SelectionTicket,
        result: Result<BoundedImage, OverlayError>,
    ) -> Result<SelectionOutcome, OverlayError> {
        if ticket.generation != self.generation {
            log::debug!(
                "⏭️ 丢弃过期选图结果（凭证代数 {}，当前代数 {}）",
                ticket.generation,
                self.generation
            );
            return Ok(SelectionOutcome::Superseded);
        }

        self.pending_selection = None;
        let image = result?;

        let guard = self.registry.register(image.bytes.clone(), BoundedImage::MEDIA_TYPE)?;
        let preview = guard.handle();

        self.image = Some(image);
        self.image_generation = ticket.generation;
        self.image_preview = Some(guard);
        self.processed = None;
        self.processed_preview = None;

        Ok(SelectionOutcome::Applied { preview })
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_size(&mut self, size: impl Into<String>) {
        self.size = size.into();
    }

    pub fn image(&self) -> Option<&BoundedImage> {
        self.image.as_ref()
    }

    pub fn processed(&self) -> Option<&ProcessedImage> {
        self.processed.as_ref()
    }

    pub fn image_preview(&self) -> Option<String> {
        self.image_preview.as_ref().map(PreviewGuard::handle)
    }

    pub fn processed_preview(&self) -> Option<String> {
        self.processed_preview.as_ref().map(PreviewGuard::handle)
    }

    pub fn is_selecting(&self) -> bool {
        self.pending_selection.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.is_selecting() || self.is_submitting()
    }

    /// 提交入口是否可用（与表单按钮的禁用条件一致）。
    pub fn can_submit(&self) -> bool {
        self.image.is_some() && !self.text.is_empty() && !self.size.is_empty() && !self.is_loading()
    }

    /// 开始一次提交：校验表单并置位加载标志。
    pub fn begin_submission(&mut self) -> Result<OverlayRequest, OverlayError> {
        if self.is_loading() {
            return Err(OverlayError::Busy);
        }

        let request = build_request(self.image.as_ref(), &self.text, &self.size)?;
        self.submitting = Some(self.image_generation);
        Ok(request)
    }

    /// 结束提交：清除加载标志，成功时替换处理结果。
    ///
    /// 失败时保留上一次的处理结果。提交期间若有新图落地，
    /// 返回结果对应的是旧图，丢弃并返回 `Stale`。
    pub fn finish_submission(
        &mut self,
        result: Result<ProcessedImage, OverlayError>,
    ) -> Result<ProcessedImage, OverlayError> {
        let started_at = self.submitting.take();
        let processed = result?;

        if started_at != Some(self.image_generation) {
            log::debug!(
                "⏭️ 丢弃过期处理结果（提交时图片代数 {:?}，当前图片代数 {}）",
                started_at,
                self.image_generation
            );
            return Err(OverlayError::Stale);
        }

        let guard = self.registry.register(processed.bytes.clone(), processed.media_type.clone())?;
        self.processed = Some(processed.clone());
        self.processed_preview = Some(guard);

        Ok(processed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            image: self.image.as_ref().map(|image| ImageSummary {
                name: image.name.clone(),
                width: image.width,
                height: image.height,
                quality: image.quality,
                bytes: image.bytes.len(),
            }),
            image_preview: self.image_preview(),
            text: self.text.clone(),
            size: self.size.clone(),
            processed: self.processed.as_ref().map(|processed| ProcessedSummary {
                media_type: processed.media_type.clone(),
                bytes: processed.bytes.len(),
                suggested_file_name: processed.suggested_file_name(),
            }),
            processed_preview: self.processed_preview(),
            is_selecting: self.is_selecting(),
            is_submitting: self.is_submitting(),
            can_submit: self.can_submit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::FormField;
    use bytes::Bytes;

    fn bounded(name: &str, width: u32) -> BoundedImage {
        BoundedImage {
            bytes: Bytes::from(vec![0xFF, 0xD8, width as u8, 0xFF, 0xD9]),
            width,
            height: 10,
            quality: 80,
            name: name.to_string(),
        }
    }

    fn processed(payload: &'static [u8]) -> ProcessedImage {
        ProcessedImage {
            bytes: Bytes::from_static(payload),
            media_type: "image/png".to_string(),
        }
    }

    fn ready_session(registry: &PreviewRegistry) -> FormSession {
        let mut session = FormSession::new(registry.clone());
        let ticket = session.begin_selection();
        session
            .commit_selection(ticket, Ok(bounded("a.jpg", 10)))
            .expect("commit should succeed");
        session.set_text("Hello");
        session.set_size("24");
        session
    }

    #[test]
    fn latest_selection_wins_over_stale_result() {
        let registry = PreviewRegistry::new();
        let mut session = FormSession::new(registry.clone());

        let first = session.begin_selection();
        let second = session.begin_selection();
        assert!(session.is_selecting());

        let outcome = session
            .commit_selection(second, Ok(bounded("second.jpg", 20)))
            .expect("commit should succeed");
        assert!(matches!(outcome, SelectionOutcome::Applied { .. }));
        assert!(!session.is_selecting());

        let stale = session
            .commit_selection(first, Ok(bounded("first.jpg", 30)))
            .expect("stale commit is not an error");
        assert_eq!(stale, SelectionOutcome::Superseded);
        assert_eq!(session.image().map(|i| i.name.as_str()), Some("second.jpg"));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn stale_failure_does_not_clear_pending_flag() {
        let mut session = FormSession::new(PreviewRegistry::new());
        let first = session.begin_selection();
        let _second = session.begin_selection();

        let outcome = session
            .commit_selection(first, Err(OverlayError::Decode("bad".into())))
            .expect("stale failure is swallowed");
        assert_eq!(outcome, SelectionOutcome::Superseded);
        assert!(session.is_selecting());
    }

    #[test]
    fn failed_selection_keeps_previous_image() {
        let registry = PreviewRegistry::new();
        let mut session = ready_session(&registry);
        let preview_before = session.image_preview();

        let ticket = session.begin_selection();
        let result = session.commit_selection(ticket, Err(OverlayError::Decode("corrupt".into())));

        assert!(matches!(result, Err(OverlayError::Decode(_))));
        assert!(!session.is_loading());
        assert_eq!(session.image().map(|i| i.name.as_str()), Some("a.jpg"));
        assert_eq!(session.image_preview(), preview_before);
    }

    #[test]
    fn new_selection_releases_old_preview_and_clears_processed() {
        let registry = PreviewRegistry::new();
        let mut session = ready_session(&registry);
        let request = session.begin_submission().expect("valid form");
        assert_eq!(request.font_size, 24);
        session.finish_submission(Ok(processed(b"png"))).expect("finish");
        assert_eq!(registry.live_count(), 2);

        let old_preview = session.image_preview().expect("preview");
        let ticket = session.begin_selection();
        session
            .commit_selection(ticket, Ok(bounded("b.jpg", 40)))
            .expect("commit should succeed");

        assert!(session.processed().is_none());
        assert!(session.processed_preview().is_none());
        assert_eq!(registry.bytes(&old_preview), None);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn submission_is_mutually_exclusive() {
        let registry = PreviewRegistry::new();
        let mut session = ready_session(&registry);

        session.begin_submission().expect("first submission");
        assert!(!session.can_submit());
        assert!(matches!(session.begin_submission(), Err(OverlayError::Busy)));

        session.finish_submission(Ok(processed(b"one"))).expect("finish");
        assert!(session.can_submit());
    }

    #[test]
    fn submission_blocked_while_selection_pending() {
        let mut session = ready_session(&PreviewRegistry::new());
        let _ticket = session.begin_selection();
        assert!(matches!(session.begin_submission(), Err(OverlayError::Busy)));
    }

    #[test]
    fn failed_submission_keeps_previous_result_and_clears_loading() {
        let registry = PreviewRegistry::new();
        let mut session = ready_session(&registry);

        session.begin_submission().expect("submission");
        session.finish_submission(Ok(processed(b"first"))).expect("finish");
        let preview = session.processed_preview();

        session.begin_submission().expect("resubmission");
        let result = session.finish_submission(Err(OverlayError::HttpStatus { status: 500 }));

        assert!(matches!(result, Err(OverlayError::HttpStatus { status: 500 })));
        assert!(!session.is_submitting());
        assert!(session.can_submit());
        assert_eq!(
            session.processed().map(|p| p.bytes.clone()),
            Some(Bytes::from_static(b"first"))
        );
        assert_eq!(session.processed_preview(), preview);
    }

    #[test]
    fn result_for_replaced_image_is_discarded() {
        let registry = PreviewRegistry::new();
        let mut session = ready_session(&registry);
        session.begin_submission().expect("submission");

        let ticket = session.begin_selection();
        session
            .commit_selection(ticket, Ok(bounded("b.jpg", 40)))
            .expect("selection during submission");

        let result = session.finish_submission(Ok(processed(b"for-a")));
        assert!(matches!(result, Err(OverlayError::Stale)));
        assert!(!session.is_submitting());
        assert!(session.processed().is_none());
        assert!(session.processed_preview().is_none());
        assert_eq!(session.image().map(|i| i.name.as_str()), Some("b.jpg"));
        assert_eq!(registry.live_count(), 1);
        assert!(session.can_submit());
    }

    #[test]
    fn failed_or_pending_selection_keeps_submission_result() {
        let mut session = ready_session(&PreviewRegistry::new());
        session.begin_submission().expect("submission");

        let failed = session.begin_selection();
        let _ = session.commit_selection(failed, Err(OverlayError::Decode("corrupt".into())));
        let _pending = session.begin_selection();

        session.finish_submission(Ok(processed(b"for-a"))).expect("image unchanged");
        assert_eq!(session.image().map(|i| i.name.as_str()), Some("a.jpg"));
        assert!(session.processed().is_some());
    }

    #[test]
    fn validation_failure_does_not_set_loading() {
        let mut session = ready_session(&PreviewRegistry::new());
        session.set_size("-5");

        let err = session.begin_submission().expect_err("invalid size");
        assert_eq!(err.invalid_field(), Some(FormField::Size));
        assert!(!session.is_loading());
    }

    #[test]
    fn dropping_session_releases_all_previews() {
        let registry = PreviewRegistry::new();
        let mut session = ready_session(&registry);
        session.begin_submission().expect("submission");
        session.finish_submission(Ok(processed(b"x"))).expect("finish");
        assert_eq!(registry.live_count(), 2);

        drop(session);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn snapshot_reflects_state() {
        let session = ready_session(&PreviewRegistry::new());
        let snapshot = session.snapshot();

        assert!(snapshot.can_submit);
        assert_eq!(snapshot.image.as_ref().map(|i| i.width), Some(10));
        assert!(snapshot.processed.is_none());
        assert_eq!(snapshot.text, "Hello");
    }
}
