use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Info,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeKind::Error => f.write_str("error"),
            NoticeKind::Info => f.write_str("info"),
        }
    }
}

/// User-visible notification surface (toast, status line, ...). Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, text: &str);
}

/// Routes notices to the `log` facade.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NoticeKind, text: &str) {
        match kind {
            NoticeKind::Error => log::error!("{text}"),
            NoticeKind::Info => log::info!("{text}"),
        }
    }
}
