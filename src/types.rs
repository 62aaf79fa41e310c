use serde::{Serialize, Serializer};

use crate::constants::{
    CONTROL_CODE_AUTOSTART, CONTROL_CODE_PRESENT, PROTOCOL_ID_HTTP, REASON_NO_APPLICATIONS,
    REASON_NO_HTTP_APPLICATIONS,
};

/// application_control_code of an AIT entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlCode {
    Autostart,
    Present,
    Other(u8),
}

impl From<u8> for ControlCode {
    fn from(code: u8) -> Self {
        match code {
            CONTROL_CODE_AUTOSTART => ControlCode::Autostart,
            CONTROL_CODE_PRESENT => ControlCode::Present,
            other => ControlCode::Other(other),
        }
    }
}

/// One application announced in an AIT application loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplicationEntry {
    pub organisation_id: u32,
    pub application_id: u16,
    pub control_code: Option<ControlCode>,
    /// protocol_id of the transport in use; HTTP wins over any other
    pub protocol_id: Option<u16>,
    pub url_base: Option<String>,
    pub url_extension: Option<String>,
    pub initial_path: Option<String>,
    /// application_priority from the application descriptor
    pub priority: Option<u8>,
}

impl ApplicationEntry {
    pub fn autostart(&self) -> bool {
        self.control_code == Some(ControlCode::Autostart)
    }

    pub fn is_http(&self) -> bool {
        self.protocol_id == Some(PROTOCOL_ID_HTTP)
    }

    /// url_base + url_extension, then initial_path joined by a single '/'.
    /// None unless the entry is HTTP with a non-empty url_base.
    pub fn url(&self) -> Option<String> {
        if !self.is_http() {
            return None;
        }
        let base = self.url_base.as_deref().filter(|b| !b.is_empty())?;

        let mut url = String::from(base);
        if let Some(ext) = self.url_extension.as_deref() {
            url.push_str(ext);
        }
        if let Some(path) = self.initial_path.as_deref().filter(|p| !p.is_empty()) {
            if !url.ends_with('/') && !path.starts_with('/') {
                url.push('/');
            }
            url.push_str(path);
        }
        Some(url)
    }
}

/// Final launch target resolved from one AIT section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HbbTvAppUrl {
    pub url: String,
    pub autostart: bool,
    pub app_id: u16,
    pub org_id: u32,
}

/// Why an AIT was decoded without yielding a launch URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoUrlReason {
    NoApplications,
    NoHttpApplications,
}

impl NoUrlReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoUrlReason::NoApplications => REASON_NO_APPLICATIONS,
            NoUrlReason::NoHttpApplications => REASON_NO_HTTP_APPLICATIONS,
        }
    }
}

impl std::fmt::Display for NoUrlReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NoUrlReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome of AIT detection delivered to the player side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AitEvent {
    UrlFound(HbbTvAppUrl),
    PresentButNoUrl { reason: NoUrlReason },
    NoneDetected,
}

impl AitEvent {
    /// Forwards the event to the matching listener callback.
    pub fn deliver(&self, listener: &mut dyn AitListener) {
        match self {
            AitEvent::UrlFound(app) => listener.on_hbbtv_url_found(app),
            AitEvent::PresentButNoUrl { reason } => listener.on_ait_present_but_no_url(reason.as_str()),
            AitEvent::NoneDetected => listener.on_no_ait_detected(),
        }
    }

    pub fn is_url_found(&self) -> bool {
        matches!(self, AitEvent::UrlFound(_))
    }
}

/// Three-way callback interface of the player collaborator.
pub trait AitListener {
    fn on_hbbtv_url_found(&mut self, app: &HbbTvAppUrl);
    fn on_ait_present_but_no_url(&mut self, reason: &str);
    fn on_no_ait_detected(&mut self);
}
