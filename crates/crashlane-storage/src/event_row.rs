// Columnar row encoding for events
//
// Every event becomes one wide row in the `events` table. Columns that belong to
// other event kinds carry their zero value, so every row has exactly the same
// column list in the same order. Values are rendered as ClickHouse SQL literals.
//
// Stack traces use nested tuples:
//   frame  = (line, col, 'module', 'file', 'class', 'method')
//   unit   = ('type', 'message', [frame, ...])
//   thread = ('name', [frame, ...])
// Empty strings inside frames are written as `__blank__`.

use chrono::{DateTime, Utc};
use crashlane_core::event::{
    Anr, AppExit, ColdLaunch, CpuUsage, ExceptionUnit, Frame, GestureClick, GestureScroll, Http,
    Exception, Launch, LifecycleActivity, LifecycleApp, LifecycleFragment, LogString, MemoryUsage,
    Navigation, NetworkChange, Thread, TrimMemory,
};
use crashlane_core::{Event, EventPayload, Session};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

/// Placeholder for empty strings inside frame tuples
pub const BLANK: &str = "__blank__";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Column names of the events table, in insert order
pub static EVENT_COLUMNS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let sample = Event::new(EventPayload::Unknown);
    event_row(&Session::new(Uuid::nil(), Uuid::nil()), &sample)
        .into_iter()
        .map(|(column, _)| column)
        .collect()
});

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
    /// Already rendered literal (tuples, arrays, maps)
    Raw(String),
}

impl Value {
    fn str(s: &str) -> Self {
        Value::Str(s.to_string())
    }

    /// Render as a SQL literal
    pub fn literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(_) => "0".to_string(),
            Value::Str(s) => quote(s),
            Value::Time(t) => quote(&format_time(t)),
            Value::Raw(r) => r.clone(),
        }
    }
}

/// Single-quote a string, escaping backslashes and quotes
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn format_time(t: &DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn blank(s: Option<&str>) -> String {
    quote(s.filter(|s| !s.is_empty()).unwrap_or(BLANK))
}

pub fn frame_tuple(frame: &Frame) -> String {
    format!(
        "({}, {}, {}, {}, {}, {})",
        frame.line_num,
        frame.col_num,
        blank(frame.module_name()),
        blank(frame.file_name()),
        blank(frame.class_name()),
        blank(frame.method_name()),
    )
}

fn frames_array(frames: &[Frame]) -> String {
    let tuples: Vec<String> = frames.iter().map(frame_tuple).collect();
    format!("[{}]", tuples.join(", "))
}

pub fn units_array(units: &[ExceptionUnit]) -> String {
    let tuples: Vec<String> = units
        .iter()
        .map(|u| format!("({}, {}, {})", quote(&u.kind), quote(&u.message), frames_array(&u.frames)))
        .collect();
    format!("[{}]", tuples.join(", "))
}

pub fn threads_array(threads: &[Thread]) -> String {
    let tuples: Vec<String> = threads
        .iter()
        .map(|t| format!("({}, {})", quote(&t.name), frames_array(&t.frames)))
        .collect();
    format!("[{}]", tuples.join(", "))
}

pub fn map_literal(map: &BTreeMap<String, String>) -> String {
    let pairs: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{}: {}", quote(k), quote(v)))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

// ============================================================================
// Row building
// ============================================================================

/// Borrow the payload when the event has this kind, otherwise a zero value
fn pick<'a, T: Clone + Default>(
    payload: &'a EventPayload,
    select: impl Fn(&'a EventPayload) -> Option<&'a T>,
) -> Cow<'a, T> {
    select(payload).map(Cow::Borrowed).unwrap_or_default()
}

struct Row(Vec<(&'static str, Value)>);

impl Row {
    fn push(&mut self, column: &'static str, value: Value) -> &mut Self {
        self.0.push((column, value));
        self
    }

    fn gesture_click(&mut self, prefix: Prefix, g: &GestureClick) {
        self.push(prefix.target, Value::str(&g.target))
            .push(prefix.target_id, Value::str(&g.target_id))
            .push(prefix.touch_down_time, Value::UInt(g.touch_down_time.into()))
            .push(prefix.touch_up_time, Value::UInt(g.touch_up_time.into()))
            .push(prefix.width, Value::UInt(g.width.into()))
            .push(prefix.height, Value::UInt(g.height.into()))
            .push(prefix.x, Value::Float(g.x.into()))
            .push(prefix.y, Value::Float(g.y.into()));
    }

    fn launch(&mut self, columns: [&'static str; 5], l: &Launch) {
        self.push(columns[0], Value::UInt(l.app_visible_uptime.into()))
            .push(columns[1], Value::UInt(l.on_next_draw_uptime.into()))
            .push(columns[2], Value::str(&l.launched_activity))
            .push(columns[3], Value::Bool(l.has_saved_state))
            .push(columns[4], Value::str(&l.intent_data));
    }
}

/// Column names of the two click gesture column groups
struct Prefix {
    target: &'static str,
    target_id: &'static str,
    touch_down_time: &'static str,
    touch_up_time: &'static str,
    width: &'static str,
    height: &'static str,
    x: &'static str,
    y: &'static str,
}

const LONG_CLICK: Prefix = Prefix {
    target: "gesture_long_click.target",
    target_id: "gesture_long_click.target_id",
    touch_down_time: "gesture_long_click.touch_down_time",
    touch_up_time: "gesture_long_click.touch_up_time",
    width: "gesture_long_click.width",
    height: "gesture_long_click.height",
    x: "gesture_long_click.x",
    y: "gesture_long_click.y",
};

const CLICK: Prefix = Prefix {
    target: "gesture_click.target",
    target_id: "gesture_click.target_id",
    touch_down_time: "gesture_click.touch_down_time",
    touch_up_time: "gesture_click.touch_up_time",
    width: "gesture_click.width",
    height: "gesture_click.height",
    x: "gesture_click.x",
    y: "gesture_click.y",
};

fn optional_time(t: Option<DateTime<Utc>>) -> Value {
    t.map(Value::Time).unwrap_or(Value::Null)
}

/// Encode one event of a session as (column, value) pairs
pub fn event_row(session: &Session, event: &Event) -> Vec<(&'static str, Value)> {
    let p = &event.payload;
    let r = &session.resource;
    let mut row = Row(Vec::with_capacity(180));

    let anr: Cow<Anr> = pick(p, |p| match p {
        EventPayload::Anr { anr } => Some(anr),
        _ => None,
    });
    let exception: Cow<Exception> = pick(p, |p| match p {
        EventPayload::Exception { exception } => Some(exception),
        _ => None,
    });

    row.push("id", Value::str(&event.id.to_string()))
        .push("type", Value::str(event.type_name()))
        .push("session_id", Value::str(&session.session_id.to_string()))
        .push("app_id", Value::str(&session.app_id.to_string()))
        .push(
            "inet.ipv4",
            session.inet.ipv4.map(|ip| Value::Str(ip.to_string())).unwrap_or(Value::Null),
        )
        .push(
            "inet.ipv6",
            session.inet.ipv6.map(|ip| Value::Str(ip.to_string())).unwrap_or(Value::Null),
        )
        .push("inet.country_code", Value::str(&session.inet.country_code))
        .push("timestamp", Value::Time(event.timestamp))
        .push("thread_name", Value::str(&event.thread_name));

    row.push("resource.device_name", Value::str(&r.device_name))
        .push("resource.device_model", Value::str(&r.device_model))
        .push("resource.device_manufacturer", Value::str(&r.device_manufacturer))
        .push("resource.device_type", Value::str(&r.device_type))
        .push("resource.device_is_foldable", Value::Bool(r.device_is_foldable))
        .push("resource.device_is_physical", Value::Bool(r.device_is_physical))
        .push("resource.device_density_dpi", Value::UInt(r.device_density_dpi.into()))
        .push("resource.device_width_px", Value::UInt(r.device_width_px.into()))
        .push("resource.device_height_px", Value::UInt(r.device_height_px.into()))
        .push("resource.device_density", Value::Float(r.device_density.into()))
        .push("resource.os_name", Value::str(&r.os_name))
        .push("resource.os_version", Value::str(&r.os_version))
        .push("resource.platform", Value::str(&r.platform))
        .push("resource.app_version", Value::str(&r.app_version))
        .push("resource.app_build", Value::str(&r.app_build))
        .push("resource.app_unique_id", Value::str(&r.app_unique_id))
        .push("resource.measure_sdk_version", Value::str(&r.sdk_version));

    row.push("anr.thread_name", Value::str(&anr.thread_name))
        .push("anr.handled", Value::Bool(false))
        .push("anr.fingerprint", Value::str(&anr.fingerprint))
        .push("anr_exceptions", Value::Raw(units_array(&anr.exceptions)))
        .push("anr_threads", Value::Raw(threads_array(&anr.threads)));

    row.push("exception.thread_name", Value::str(&exception.thread_name))
        .push("exception.handled", Value::Bool(exception.handled))
        .push("exception.fingerprint", Value::str(&exception.fingerprint))
        .push("exception_exceptions", Value::Raw(units_array(&exception.exceptions)))
        .push("exception_threads", Value::Raw(threads_array(&exception.threads)));

    let app_exit: Cow<AppExit> = pick(p, |p| match p {
        EventPayload::AppExit { app_exit } => Some(app_exit),
        _ => None,
    });
    row.push("app_exit.reason", Value::str(&app_exit.reason))
        .push("app_exit.importance", Value::str(&app_exit.importance))
        .push("app_exit.trace", Value::str(&app_exit.trace))
        .push("app_exit.process_name", Value::str(&app_exit.process_name))
        .push("app_exit.pid", Value::str(&app_exit.pid))
        .push("app_exit.timestamp", Value::Time(app_exit.timestamp));

    let string: Cow<LogString> = pick(p, |p| match p {
        EventPayload::String { string } => Some(string),
        _ => None,
    });
    row.push("string.severity_text", Value::str(&string.severity_text))
        .push("string.string", Value::str(&string.string));

    let long_click: Cow<GestureClick> = pick(p, |p| match p {
        EventPayload::GestureLongClick { gesture_long_click } => Some(gesture_long_click),
        _ => None,
    });
    row.gesture_click(LONG_CLICK, &long_click);

    let click: Cow<GestureClick> = pick(p, |p| match p {
        EventPayload::GestureClick { gesture_click } => Some(gesture_click),
        _ => None,
    });
    row.gesture_click(CLICK, &click);

    let scroll: Cow<GestureScroll> = pick(p, |p| match p {
        EventPayload::GestureScroll { gesture_scroll } => Some(gesture_scroll),
        _ => None,
    });
    row.push("gesture_scroll.target", Value::str(&scroll.target))
        .push("gesture_scroll.target_id", Value::str(&scroll.target_id))
        .push("gesture_scroll.touch_down_time", Value::UInt(scroll.touch_down_time.into()))
        .push("gesture_scroll.touch_up_time", Value::UInt(scroll.touch_up_time.into()))
        .push("gesture_scroll.x", Value::Float(scroll.x.into()))
        .push("gesture_scroll.y", Value::Float(scroll.y.into()))
        .push("gesture_scroll.end_x", Value::Float(scroll.end_x.into()))
        .push("gesture_scroll.end_y", Value::Float(scroll.end_y.into()))
        .push("gesture_scroll.direction", Value::str(&scroll.direction));

    let activity: Cow<LifecycleActivity> = pick(p, |p| match p {
        EventPayload::LifecycleActivity { lifecycle_activity } => Some(lifecycle_activity),
        _ => None,
    });
    row.push("lifecycle_activity.type", Value::str(&activity.kind))
        .push("lifecycle_activity.class_name", Value::str(&activity.class_name))
        .push("lifecycle_activity.intent", Value::str(&activity.intent))
        .push(
            "lifecycle_activity.saved_instance_state",
            Value::Bool(activity.saved_instance_state),
        );

    let fragment: Cow<LifecycleFragment> = pick(p, |p| match p {
        EventPayload::LifecycleFragment { lifecycle_fragment } => Some(lifecycle_fragment),
        _ => None,
    });
    row.push("lifecycle_fragment.type", Value::str(&fragment.kind))
        .push("lifecycle_fragment.class_name", Value::str(&fragment.class_name))
        .push("lifecycle_fragment.parent_activity", Value::str(&fragment.parent_activity))
        .push("lifecycle_fragment.tag", Value::str(&fragment.tag));

    let app: Cow<LifecycleApp> = pick(p, |p| match p {
        EventPayload::LifecycleApp { lifecycle_app } => Some(lifecycle_app),
        _ => None,
    });
    row.push("lifecycle_app.type", Value::str(&app.kind));

    let cold: Cow<ColdLaunch> = pick(p, |p| match p {
        EventPayload::ColdLaunch { cold_launch } => Some(cold_launch),
        _ => None,
    });
    row.push("cold_launch.process_start_uptime", Value::UInt(cold.process_start_uptime.into()))
        .push(
            "cold_launch.process_start_requested_uptime",
            Value::UInt(cold.process_start_requested_uptime.into()),
        )
        .push(
            "cold_launch.content_provider_attach_uptime",
            Value::UInt(cold.content_provider_attach_uptime.into()),
        )
        .push("cold_launch.on_next_draw_uptime", Value::UInt(cold.on_next_draw_uptime.into()))
        .push("cold_launch.launched_activity", Value::str(&cold.launched_activity))
        .push("cold_launch.has_saved_state", Value::Bool(cold.has_saved_state))
        .push("cold_launch.intent_data", Value::str(&cold.intent_data));

    let warm: Cow<Launch> = pick(p, |p| match p {
        EventPayload::WarmLaunch { warm_launch } => Some(warm_launch),
        _ => None,
    });
    row.launch(
        [
            "warm_launch.app_visible_uptime",
            "warm_launch.on_next_draw_uptime",
            "warm_launch.launched_activity",
            "warm_launch.has_saved_state",
            "warm_launch.intent_data",
        ],
        &warm,
    );

    let hot: Cow<Launch> = pick(p, |p| match p {
        EventPayload::HotLaunch { hot_launch } => Some(hot_launch),
        _ => None,
    });
    row.launch(
        [
            "hot_launch.app_visible_uptime",
            "hot_launch.on_next_draw_uptime",
            "hot_launch.launched_activity",
            "hot_launch.has_saved_state",
            "hot_launch.intent_data",
        ],
        &hot,
    );

    row.push("attributes", Value::Raw(map_literal(&event.attributes)));

    let network: Cow<NetworkChange> = pick(p, |p| match p {
        EventPayload::NetworkChange { network_change } => Some(network_change),
        _ => None,
    });
    row.push("network_change.network_type", Value::str(&network.network_type))
        .push(
            "network_change.previous_network_type",
            Value::str(&network.previous_network_type),
        )
        .push("network_change.network_generation", Value::str(&network.network_generation))
        .push(
            "network_change.previous_network_generation",
            Value::str(&network.previous_network_generation),
        )
        .push("network_change.network_provider", Value::str(&network.network_provider));

    row.push("anr.network_type", Value::str(&anr.network_type))
        .push("anr.network_generation", Value::str(&anr.network_generation))
        .push("anr.network_provider", Value::str(&anr.network_provider))
        .push("exception.network_type", Value::str(&exception.network_type))
        .push("exception.network_generation", Value::str(&exception.network_generation))
        .push("exception.network_provider", Value::str(&exception.network_provider))
        .push("resource.network_type", Value::str(&r.network_type))
        .push("resource.network_generation", Value::str(&r.network_generation))
        .push("resource.network_provider", Value::str(&r.network_provider))
        .push("resource.device_locale", Value::str(&r.device_locale))
        .push("anr.device_locale", Value::str(&anr.device_locale))
        .push("exception.device_locale", Value::str(&exception.device_locale));

    let http: Cow<Http> = pick(p, |p| match p {
        EventPayload::Http { http } => Some(http),
        _ => None,
    });
    row.push("http.url", Value::str(&http.url))
        .push("http.method", Value::str(&http.method))
        .push("http.status_code", Value::Int(http.status_code.into()))
        .push("http.request_body_size", Value::Int(http.request_body_size.into()))
        .push("http.response_body_size", Value::Int(http.response_body_size.into()))
        .push("http.request_timestamp", optional_time(http.request_timestamp))
        .push("http.response_timestamp", optional_time(http.response_timestamp))
        .push("http.start_time", Value::UInt(http.start_time))
        .push("http.end_time", Value::UInt(http.end_time))
        .push("http.dns_start", Value::UInt(http.dns_start))
        .push("http.dns_end", Value::UInt(http.dns_end))
        .push("http.connect_start", Value::UInt(http.connect_start))
        .push("http.connect_end", Value::UInt(http.connect_end))
        .push("http.request_start", Value::UInt(http.request_start))
        .push("http.request_end", Value::UInt(http.request_end))
        .push("http.request_headers_start", Value::UInt(http.request_headers_start))
        .push("http.request_headers_end", Value::UInt(http.request_headers_end))
        .push("http.request_body_start", Value::UInt(http.request_body_start))
        .push("http.request_body_end", Value::UInt(http.request_body_end))
        .push("http.response_start", Value::UInt(http.response_start))
        .push("http.response_end", Value::UInt(http.response_end))
        .push("http.response_headers_start", Value::UInt(http.response_headers_start))
        .push("http.response_headers_end", Value::UInt(http.response_headers_end))
        .push("http.response_body_start", Value::UInt(http.response_body_start))
        .push("http.response_body_end", Value::UInt(http.response_body_end))
        .push("http.request_headers_size", Value::Int(http.request_headers_size.into()))
        .push("http.response_headers_size", Value::Int(http.response_headers_size.into()))
        .push("http.failure_reason", Value::str(&http.failure_reason))
        .push("http.failure_description", Value::str(&http.failure_description))
        .push("http_request_headers", Value::Raw(map_literal(&http.request_headers)))
        .push("http_response_headers", Value::Raw(map_literal(&http.response_headers)))
        .push("http.client", Value::str(&http.client));

    let memory: Cow<MemoryUsage> = pick(p, |p| match p {
        EventPayload::MemoryUsage { memory_usage } => Some(memory_usage),
        _ => None,
    });
    row.push("memory_usage.java_max_heap", Value::UInt(memory.java_max_heap))
        .push("memory_usage.java_total_heap", Value::UInt(memory.java_total_heap))
        .push("memory_usage.java_free_heap", Value::UInt(memory.java_free_heap))
        .push("memory_usage.total_pss", Value::UInt(memory.total_pss))
        .push("memory_usage.rss", Value::UInt(memory.rss))
        .push("memory_usage.native_total_heap", Value::UInt(memory.native_total_heap))
        .push("memory_usage.native_free_heap", Value::UInt(memory.native_free_heap))
        .push("memory_usage.interval_config", Value::UInt(memory.interval_config));

    row.push(
        "low_memory",
        Value::Bool(matches!(p, EventPayload::LowMemory { .. })),
    );

    let trim: Cow<TrimMemory> = pick(p, |p| match p {
        EventPayload::TrimMemory { trim_memory } => Some(trim_memory),
        _ => None,
    });
    row.push("trim_memory.level", Value::str(&trim.level));

    let cpu: Cow<CpuUsage> = pick(p, |p| match p {
        EventPayload::CpuUsage { cpu_usage } => Some(cpu_usage),
        _ => None,
    });
    row.push("cpu_usage.num_cores", Value::UInt(cpu.num_cores.into()))
        .push("cpu_usage.clock_speed", Value::UInt(cpu.clock_speed))
        .push("cpu_usage.start_time", Value::UInt(cpu.start_time))
        .push("cpu_usage.uptime", Value::UInt(cpu.uptime))
        .push("cpu_usage.utime", Value::UInt(cpu.utime))
        .push("cpu_usage.cutime", Value::UInt(cpu.cutime))
        .push("cpu_usage.stime", Value::UInt(cpu.stime))
        .push("cpu_usage.cstime", Value::UInt(cpu.cstime))
        .push("cpu_usage.interval_config", Value::UInt(cpu.interval_config.into()));

    let navigation: Cow<Navigation> = pick(p, |p| match p {
        EventPayload::Navigation { navigation } => Some(navigation),
        _ => None,
    });
    row.push("navigation.route", Value::str(&navigation.route));

    row.0
}

/// Render one event as a parenthesised VALUES tuple
pub fn values_tuple(session: &Session, event: &Event) -> String {
    let literals: Vec<String> = event_row(session, event)
        .iter()
        .map(|(_, value)| value.literal())
        .collect();
    format!("({})", literals.join(", "))
}
