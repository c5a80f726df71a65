// Event domain types
//
// An event is a set of common fields (timestamp, thread, attributes) plus exactly one
// kind-specific payload. On the wire the payload object is keyed by the type name:
//
//   { "type": "exception", "timestamp": "...", "thread_name": "main",
//     "exception": { ... }, "attributes": { ... } }
//
// A missing payload object deserializes to an all-default payload so that validation,
// not parsing, reports the missing required fields. An unrecognised type string
// deserializes to `EventPayload::Unknown`, which validation rejects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// The instant used when a timestamp is absent from the payload
pub fn zero_instant() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// True when the timestamp was never set
pub fn is_zero_instant(ts: &DateTime<Utc>) -> bool {
    *ts == zero_instant()
}

/// Strip trailing NUL padding
pub fn trim_nul(s: &mut String) {
    let trimmed = s.trim_end_matches('\0').len();
    s.truncate(trimmed);
}

// ============================================================================
// Stack traces
// ============================================================================

/// A single stack frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub line_num: i32,
    #[serde(default)]
    pub col_num: i32,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub method_name: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Frame {
    pub fn class_name(&self) -> Option<&str> {
        non_empty(&self.class_name)
    }

    pub fn method_name(&self) -> Option<&str> {
        non_empty(&self.method_name)
    }

    pub fn file_name(&self) -> Option<&str> {
        non_empty(&self.file_name)
    }

    pub fn module_name(&self) -> Option<&str> {
        non_empty(&self.module_name)
    }
}

/// Renders `class.method(file:line)`, omitting absent parts
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code: Vec<&str> = [self.class_name(), self.method_name()]
            .into_iter()
            .flatten()
            .collect();
        write!(f, "{}", code.join("."))?;

        let line = (self.line_num != 0).then(|| self.line_num.to_string());
        let location: Vec<&str> = [self.file_name(), line.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !location.is_empty() {
            write!(f, "({})", location.join(":"))?;
        }
        Ok(())
    }
}

/// One exception in a (possibly chained) exception
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionUnit {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

/// A thread captured alongside a crash or hang
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

/// Shared shape of exception and ANR payloads
pub trait CrashPayload {
    fn thread_name(&self) -> &str;
    fn units(&self) -> &[ExceptionUnit];
    fn units_mut(&mut self) -> &mut [ExceptionUnit];
    fn threads(&self) -> &[Thread];
    fn threads_mut(&mut self) -> &mut [Thread];
    fn fingerprint(&self) -> &str;
    fn set_fingerprint(&mut self, fingerprint: String);

    /// The outermost exception type, used as the human-readable group signature
    fn signature(&self) -> &str {
        self.units().last().map(|u| u.kind.as_str()).unwrap_or_default()
    }

    /// Message of the outermost exception
    fn message(&self) -> &str {
        self.units().last().map(|u| u.message.as_str()).unwrap_or_default()
    }

    /// Top frame of the outermost exception
    fn location(&self) -> Option<String> {
        self.units()
            .last()
            .and_then(|u| u.frames.first())
            .map(|f| f.to_string())
    }
}

/// Application-not-responding payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Anr {
    #[serde(default)]
    pub thread_name: String,
    #[serde(default)]
    pub exceptions: Vec<ExceptionUnit>,
    #[serde(default)]
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub network_type: String,
    #[serde(default)]
    pub network_generation: String,
    #[serde(default)]
    pub network_provider: String,
    #[serde(default)]
    pub device_locale: String,
    /// Lowercase hex SimHash, set once after symbolication
    #[serde(default, skip_deserializing)]
    pub fingerprint: String,
}

impl CrashPayload for Anr {
    fn thread_name(&self) -> &str {
        &self.thread_name
    }

    fn units(&self) -> &[ExceptionUnit] {
        &self.exceptions
    }

    fn units_mut(&mut self) -> &mut [ExceptionUnit] {
        &mut self.exceptions
    }

    fn threads(&self) -> &[Thread] {
        &self.threads
    }

    fn threads_mut(&mut self) -> &mut [Thread] {
        &mut self.threads
    }

    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn set_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = fingerprint;
    }
}

impl Anr {
    fn trim(&mut self) {
        trim_nul(&mut self.thread_name);
        trim_nul(&mut self.network_type);
        trim_nul(&mut self.network_generation);
        trim_nul(&mut self.network_provider);
        trim_nul(&mut self.device_locale);
    }
}

/// Exception payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    #[serde(default)]
    pub thread_name: String,
    #[serde(default)]
    pub handled: bool,
    #[serde(default)]
    pub exceptions: Vec<ExceptionUnit>,
    #[serde(default)]
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub network_type: String,
    #[serde(default)]
    pub network_generation: String,
    #[serde(default)]
    pub network_provider: String,
    #[serde(default)]
    pub device_locale: String,
    /// Lowercase hex SimHash, set once after symbolication for unhandled exceptions
    #[serde(default, skip_deserializing)]
    pub fingerprint: String,
}

impl CrashPayload for Exception {
    fn thread_name(&self) -> &str {
        &self.thread_name
    }

    fn units(&self) -> &[ExceptionUnit] {
        &self.exceptions
    }

    fn units_mut(&mut self) -> &mut [ExceptionUnit] {
        &mut self.exceptions
    }

    fn threads(&self) -> &[Thread] {
        &self.threads
    }

    fn threads_mut(&mut self) -> &mut [Thread] {
        &mut self.threads
    }

    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn set_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = fingerprint;
    }
}

impl Exception {
    fn trim(&mut self) {
        trim_nul(&mut self.thread_name);
        trim_nul(&mut self.network_type);
        trim_nul(&mut self.network_generation);
        trim_nul(&mut self.network_provider);
        trim_nul(&mut self.device_locale);
    }
}

// ============================================================================
// Other payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppExit {
    pub reason: String,
    pub importance: String,
    pub trace: String,
    pub process_name: String,
    pub pid: String,
    #[serde(default = "zero_instant")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogString {
    pub severity_text: String,
    pub string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureClick {
    pub target: String,
    pub target_id: String,
    pub touch_down_time: u32,
    pub touch_up_time: u32,
    pub width: u16,
    pub height: u16,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureScroll {
    pub target: String,
    pub target_id: String,
    pub touch_down_time: u32,
    pub touch_up_time: u32,
    pub x: f32,
    pub y: f32,
    pub end_x: f32,
    pub end_y: f32,
    pub direction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleActivity {
    #[serde(rename = "type")]
    pub kind: String,
    pub class_name: String,
    pub intent: String,
    pub saved_instance_state: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleFragment {
    #[serde(rename = "type")]
    pub kind: String,
    pub class_name: String,
    pub parent_activity: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleApp {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColdLaunch {
    pub process_start_uptime: u32,
    pub process_start_requested_uptime: u32,
    pub content_provider_attach_uptime: u32,
    pub on_next_draw_uptime: u32,
    pub launched_activity: String,
    pub has_saved_state: bool,
    pub intent_data: String,
}

/// Warm and hot launches share a shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Launch {
    pub app_visible_uptime: u32,
    pub on_next_draw_uptime: u32,
    pub launched_activity: String,
    pub has_saved_state: bool,
    pub intent_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkChange {
    pub network_type: String,
    pub previous_network_type: String,
    pub network_generation: String,
    pub previous_network_generation: String,
    pub network_provider: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub url: String,
    pub method: String,
    pub status_code: i32,
    pub request_body_size: i32,
    pub response_body_size: i32,
    pub request_timestamp: Option<DateTime<Utc>>,
    pub response_timestamp: Option<DateTime<Utc>>,
    pub start_time: u64,
    pub end_time: u64,
    pub dns_start: u64,
    pub dns_end: u64,
    pub connect_start: u64,
    pub connect_end: u64,
    pub request_start: u64,
    pub request_end: u64,
    pub request_headers_start: u64,
    pub request_headers_end: u64,
    pub request_body_start: u64,
    pub request_body_end: u64,
    pub response_start: u64,
    pub response_end: u64,
    pub response_headers_start: u64,
    pub response_headers_end: u64,
    pub response_body_start: u64,
    pub response_body_end: u64,
    pub request_headers_size: i32,
    pub response_headers_size: i32,
    pub failure_reason: String,
    pub failure_description: String,
    pub request_headers: BTreeMap<String, String>,
    pub response_headers: BTreeMap<String, String>,
    pub client: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryUsage {
    pub java_max_heap: u64,
    pub java_total_heap: u64,
    pub java_free_heap: u64,
    pub total_pss: u64,
    pub rss: u64,
    pub native_total_heap: u64,
    pub native_free_heap: u64,
    pub interval_config: u64,
    pub interval_start_time: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LowMemory {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimMemory {
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    pub num_cores: u8,
    pub clock_speed: u64,
    pub start_time: u64,
    pub uptime: u64,
    pub utime: u64,
    pub cutime: u64,
    pub stime: u64,
    pub cstime: u64,
    pub interval_config: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Navigation {
    pub route: String,
}

// ============================================================================
// Event
// ============================================================================

/// Kind-specific event payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Exception {
        #[serde(default)]
        exception: Exception,
    },
    Anr {
        #[serde(default)]
        anr: Anr,
    },
    AppExit {
        #[serde(default)]
        app_exit: AppExit,
    },
    String {
        #[serde(default)]
        string: LogString,
    },
    GestureClick {
        #[serde(default)]
        gesture_click: GestureClick,
    },
    GestureLongClick {
        #[serde(default)]
        gesture_long_click: GestureClick,
    },
    GestureScroll {
        #[serde(default)]
        gesture_scroll: GestureScroll,
    },
    LifecycleActivity {
        #[serde(default)]
        lifecycle_activity: LifecycleActivity,
    },
    LifecycleFragment {
        #[serde(default)]
        lifecycle_fragment: LifecycleFragment,
    },
    LifecycleApp {
        #[serde(default)]
        lifecycle_app: LifecycleApp,
    },
    ColdLaunch {
        #[serde(default)]
        cold_launch: ColdLaunch,
    },
    WarmLaunch {
        #[serde(default)]
        warm_launch: Launch,
    },
    HotLaunch {
        #[serde(default)]
        hot_launch: Launch,
    },
    NetworkChange {
        #[serde(default)]
        network_change: NetworkChange,
    },
    Http {
        #[serde(default)]
        http: Http,
    },
    MemoryUsage {
        #[serde(default)]
        memory_usage: MemoryUsage,
    },
    LowMemory {
        #[serde(default)]
        low_memory: LowMemory,
    },
    TrimMemory {
        #[serde(default)]
        trim_memory: TrimMemory,
    },
    CpuUsage {
        #[serde(default)]
        cpu_usage: CpuUsage,
    },
    Navigation {
        #[serde(default)]
        navigation: Navigation,
    },
    /// Any type string this server does not recognise
    #[serde(other)]
    Unknown,
}

impl EventPayload {
    /// Wire name of the event kind
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::Exception { .. } => "exception",
            EventPayload::Anr { .. } => "anr",
            EventPayload::AppExit { .. } => "app_exit",
            EventPayload::String { .. } => "string",
            EventPayload::GestureClick { .. } => "gesture_click",
            EventPayload::GestureLongClick { .. } => "gesture_long_click",
            EventPayload::GestureScroll { .. } => "gesture_scroll",
            EventPayload::LifecycleActivity { .. } => "lifecycle_activity",
            EventPayload::LifecycleFragment { .. } => "lifecycle_fragment",
            EventPayload::LifecycleApp { .. } => "lifecycle_app",
            EventPayload::ColdLaunch { .. } => "cold_launch",
            EventPayload::WarmLaunch { .. } => "warm_launch",
            EventPayload::HotLaunch { .. } => "hot_launch",
            EventPayload::NetworkChange { .. } => "network_change",
            EventPayload::Http { .. } => "http",
            EventPayload::MemoryUsage { .. } => "memory_usage",
            EventPayload::LowMemory { .. } => "low_memory",
            EventPayload::TrimMemory { .. } => "trim_memory",
            EventPayload::CpuUsage { .. } => "cpu_usage",
            EventPayload::Navigation { .. } => "navigation",
            EventPayload::Unknown => "unknown",
        }
    }
}

/// A single timestamped occurrence within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by the server before persistence
    #[serde(default = "Uuid::nil", skip_deserializing)]
    pub id: Uuid,
    #[serde(default = "zero_instant")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub thread_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Create an event with the given payload, stamped now on the main thread
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::nil(),
            timestamp: Utc::now(),
            thread_name: "main".to_string(),
            attributes: BTreeMap::new(),
            payload,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }

    pub fn exception(&self) -> Option<&Exception> {
        match &self.payload {
            EventPayload::Exception { exception } => Some(exception),
            _ => None,
        }
    }

    pub fn anr(&self) -> Option<&Anr> {
        match &self.payload {
            EventPayload::Anr { anr } => Some(anr),
            _ => None,
        }
    }

    pub fn is_unhandled_exception(&self) -> bool {
        self.exception().is_some_and(|e| !e.handled)
    }

    pub fn is_anr(&self) -> bool {
        self.anr().is_some()
    }

    /// Strip NUL padding from client strings
    pub fn trim(&mut self) {
        trim_nul(&mut self.thread_name);
        match &mut self.payload {
            EventPayload::Exception { exception } => exception.trim(),
            EventPayload::Anr { anr } => anr.trim(),
            _ => {}
        }
    }
}
