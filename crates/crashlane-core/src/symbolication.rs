// Symbolication transcoding
//
// Encode walks every event and extracts each obfuscated value into a flat batch of
// units, remembering in a codec map exactly where each unit came from. The batch goes
// to an external deobfuscator; decode writes each returned unit back to the address
// it was read from. Nothing is written back unless the whole round trip succeeded.
//
// Unit values are line encoded:
//   frames  -> "\tat <class>.<method>(<file>:<line>)", one line per frame
//   scalars -> "\tgeneric: <value>"

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::event::{CrashPayload, Event, EventPayload, Frame};
use crate::session::Session;
use crate::traits::Deobfuscator;

pub const FRAME_PREFIX: &str = "\tat ";
pub const GENERIC_PREFIX: &str = "\tgeneric: ";
pub const MAPPING_TYPE_PROGUARD: &str = "proguard";

/// Field of an event that a unit was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecField {
    /// Frames of the n-th exception unit of an exception or ANR
    UnitFrames(usize),
    /// Type name of the n-th exception unit of an exception or ANR
    UnitType(usize),
    /// Frames of the n-th thread of an exception or ANR
    ThreadFrames(usize),
    AppExitTrace,
    ActivityClassName,
    FragmentClassName,
    FragmentParentActivity,
    /// Launched activity of a cold, warm or hot launch
    LaunchedActivity,
}

/// Exact origin of an encoded unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecAddress {
    pub event: usize,
    pub field: CodecField,
}

pub type CodecMap = HashMap<Uuid, CodecAddress>;

/// One batch entry: an opaque id and its line-encoded values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicationUnit {
    pub id: Uuid,
    pub values: Vec<String>,
}

/// Request body sent to the deobfuscation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicationRequest {
    /// Session being symbolicated
    pub id: Uuid,
    pub app_id: Uuid,
    pub mapping_type: String,
    /// Mapping file reference
    pub key: String,
    pub data: Vec<SymbolicationUnit>,
}

/// Response body returned by the deobfuscation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicationResponse {
    #[serde(default)]
    pub data: Vec<SymbolicationUnit>,
}

// ============================================================================
// Frame line codec
// ============================================================================

pub fn marshal_frame(frame: &Frame) -> String {
    format!("{FRAME_PREFIX}{frame}")
}

/// Parse a frame line back into class, method, file and line.
///
/// Module name and column number are not carried by the line format. A location
/// without a `:` is a line number when it is all digits, otherwise a file name.
pub fn unmarshal_frame(line: &str) -> Option<Frame> {
    let body = line.strip_prefix(FRAME_PREFIX)?;
    let (code, location) = match body.strip_suffix(')').and_then(|b| b.rsplit_once('(')) {
        Some((code, location)) => (code, location),
        None => (body, ""),
    };
    if code.contains(['(', ')']) || location.contains(['(', ')']) {
        return None;
    }

    let (class_name, method_name) = code.rsplit_once('.').unwrap_or((code, ""));

    let (file_name, line_num) = match location.rsplit_once(':') {
        Some((file, line)) => match line.parse::<i32>() {
            Ok(n) => (file, n),
            Err(_) => (location, 0),
        },
        None if !location.is_empty() && location.bytes().all(|b| b.is_ascii_digit()) => {
            match location.parse::<i32>() {
                Ok(n) => ("", n),
                Err(_) => (location, 0),
            }
        }
        None => (location, 0),
    };

    let some = |s: &str| (!s.is_empty()).then(|| s.to_string());
    Some(Frame {
        line_num,
        col_num: 0,
        module_name: None,
        file_name: some(file_name),
        class_name: some(class_name),
        method_name: some(method_name),
    })
}

/// Give a parsed frame the same set of present fields as the frame it came from.
///
/// The line format cannot tell a bare class from a bare method, or a numeric file
/// name from a line number.
fn reshape(before: &Frame, mut after: Frame) -> Frame {
    let code = match (after.class_name.take(), after.method_name.take()) {
        (Some(class), Some(method)) => Some(format!("{class}.{method}")),
        (class, method) => class.or(method),
    };
    match (before.class_name().is_some(), before.method_name().is_some()) {
        (true, false) => after.class_name = code,
        (false, true) => after.method_name = code,
        _ => {
            let split = code
                .as_deref()
                .and_then(|c| c.rsplit_once('.'))
                .map(|(class, method)| (class.to_string(), method.to_string()));
            match split {
                Some((class, method)) => {
                    after.class_name = Some(class);
                    after.method_name = Some(method);
                }
                None => after.class_name = code,
            }
        }
    }

    if before.file_name().is_some() && before.line_num == 0 && after.file_name.is_none() && after.line_num != 0 {
        after.file_name = Some(after.line_num.to_string());
        after.line_num = 0;
    }

    Frame {
        module_name: before.module_name.clone(),
        col_num: before.col_num,
        ..after
    }
}

fn encode_frames(frames: &[Frame]) -> Vec<String> {
    frames.iter().map(marshal_frame).collect()
}

fn encode_scalar(value: &str) -> Vec<String> {
    vec![format!("{GENERIC_PREFIX}{value}")]
}

fn decode_scalar(values: &[String]) -> Option<String> {
    let first = values.first()?;
    Some(first.strip_prefix(GENERIC_PREFIX).unwrap_or(first).to_string())
}

/// Merge returned frames into the originals.
///
/// With an unchanged count each frame keeps its module and column; otherwise the
/// returned list replaces the original.
fn merge_frames(original: &[Frame], values: &[String]) -> Vec<Frame> {
    let parsed: Vec<Frame> = values
        .iter()
        .filter_map(|value| {
            let frame = unmarshal_frame(value);
            if frame.is_none() {
                warn!(value = %value, "failed to unmarshal retrace frame");
            }
            frame
        })
        .collect();

    if parsed.len() != original.len() {
        return parsed;
    }

    original
        .iter()
        .zip(parsed)
        .map(|(before, after)| reshape(before, after))
        .collect()
}

// ============================================================================
// Encode
// ============================================================================

fn crash_sites(payload: &impl CrashPayload, sites: &mut Vec<(CodecField, Vec<String>)>) {
    for (index, unit) in payload.units().iter().enumerate() {
        if !unit.frames.is_empty() {
            sites.push((CodecField::UnitFrames(index), encode_frames(&unit.frames)));
        }
        if !unit.kind.is_empty() {
            sites.push((CodecField::UnitType(index), encode_scalar(&unit.kind)));
        }
    }
    for (index, thread) in payload.threads().iter().enumerate() {
        if !thread.frames.is_empty() {
            sites.push((CodecField::ThreadFrames(index), encode_frames(&thread.frames)));
        }
    }
}

/// Every obfuscatable value of one event, with its field
fn sites(event: &Event) -> Vec<(CodecField, Vec<String>)> {
    let mut sites = Vec::new();
    match &event.payload {
        EventPayload::Exception { exception } => crash_sites(exception, &mut sites),
        EventPayload::Anr { anr } => crash_sites(anr, &mut sites),
        EventPayload::AppExit { app_exit } if !app_exit.trace.is_empty() => {
            sites.push((CodecField::AppExitTrace, encode_scalar(&app_exit.trace)));
        }
        EventPayload::LifecycleActivity { lifecycle_activity }
            if !lifecycle_activity.class_name.is_empty() =>
        {
            sites.push((
                CodecField::ActivityClassName,
                encode_scalar(&lifecycle_activity.class_name),
            ));
        }
        EventPayload::LifecycleFragment { lifecycle_fragment } => {
            if !lifecycle_fragment.class_name.is_empty() {
                sites.push((
                    CodecField::FragmentClassName,
                    encode_scalar(&lifecycle_fragment.class_name),
                ));
            }
            if !lifecycle_fragment.parent_activity.is_empty() {
                sites.push((
                    CodecField::FragmentParentActivity,
                    encode_scalar(&lifecycle_fragment.parent_activity),
                ));
            }
        }
        EventPayload::ColdLaunch { cold_launch } if !cold_launch.launched_activity.is_empty() => {
            sites.push((
                CodecField::LaunchedActivity,
                encode_scalar(&cold_launch.launched_activity),
            ));
        }
        EventPayload::WarmLaunch { warm_launch: launch }
        | EventPayload::HotLaunch { hot_launch: launch }
            if !launch.launched_activity.is_empty() =>
        {
            sites.push((
                CodecField::LaunchedActivity,
                encode_scalar(&launch.launched_activity),
            ));
        }
        _ => {}
    }
    sites
}

/// True when at least one event carries a value worth deobfuscating
pub fn needs_symbolication(session: &Session) -> bool {
    session.events.iter().any(|event| !sites(event).is_empty())
}

/// Extract every obfuscatable value of the session into a batch
pub fn encode(session: &Session) -> (CodecMap, Vec<SymbolicationUnit>) {
    let mut codec_map = CodecMap::new();
    let mut units = Vec::new();

    for (index, event) in session.events.iter().enumerate() {
        for (field, values) in sites(event) {
            let id = Uuid::new_v4();
            codec_map.insert(id, CodecAddress { event: index, field });
            units.push(SymbolicationUnit { id, values });
        }
    }

    (codec_map, units)
}

// ============================================================================
// Decode
// ============================================================================

fn decode_crash(payload: &mut impl CrashPayload, field: CodecField, values: &[String]) -> bool {
    match field {
        CodecField::UnitFrames(index) => match payload.units_mut().get_mut(index) {
            Some(unit) => {
                unit.frames = merge_frames(&unit.frames, values);
                true
            }
            None => false,
        },
        CodecField::UnitType(index) => match (payload.units_mut().get_mut(index), decode_scalar(values)) {
            (Some(unit), Some(kind)) => {
                unit.kind = kind;
                true
            }
            _ => false,
        },
        CodecField::ThreadFrames(index) => match payload.threads_mut().get_mut(index) {
            Some(thread) => {
                thread.frames = merge_frames(&thread.frames, values);
                true
            }
            None => false,
        },
        _ => false,
    }
}

fn replace(target: &mut String, values: &[String]) -> bool {
    match decode_scalar(values) {
        Some(value) => {
            *target = value;
            true
        }
        None => false,
    }
}

fn write_back(event: &mut Event, field: CodecField, values: &[String]) -> bool {
    match (&mut event.payload, field) {
        (EventPayload::Exception { exception }, _) => decode_crash(exception, field, values),
        (EventPayload::Anr { anr }, _) => decode_crash(anr, field, values),
        (EventPayload::AppExit { app_exit }, CodecField::AppExitTrace) => {
            replace(&mut app_exit.trace, values)
        }
        (EventPayload::LifecycleActivity { lifecycle_activity }, CodecField::ActivityClassName) => {
            replace(&mut lifecycle_activity.class_name, values)
        }
        (EventPayload::LifecycleFragment { lifecycle_fragment }, CodecField::FragmentClassName) => {
            replace(&mut lifecycle_fragment.class_name, values)
        }
        (
            EventPayload::LifecycleFragment { lifecycle_fragment },
            CodecField::FragmentParentActivity,
        ) => replace(&mut lifecycle_fragment.parent_activity, values),
        (EventPayload::ColdLaunch { cold_launch }, CodecField::LaunchedActivity) => {
            replace(&mut cold_launch.launched_activity, values)
        }
        (EventPayload::WarmLaunch { warm_launch: launch }, CodecField::LaunchedActivity)
        | (EventPayload::HotLaunch { hot_launch: launch }, CodecField::LaunchedActivity) => {
            replace(&mut launch.launched_activity, values)
        }
        _ => false,
    }
}

/// Write returned units back to the addresses recorded at encode time.
///
/// Units with unknown ids or addresses that no longer fit the session are skipped.
pub fn decode(session: &mut Session, codec_map: &CodecMap, units: &[SymbolicationUnit]) {
    for unit in units {
        let Some(address) = codec_map.get(&unit.id) else {
            warn!(unit_id = %unit.id, "symbolication unit has no codec entry, skipping");
            continue;
        };
        let written = session
            .events
            .get_mut(address.event)
            .is_some_and(|event| write_back(event, address.field, &unit.values));
        if !written {
            warn!(
                unit_id = %unit.id,
                event = address.event,
                field = ?address.field,
                "symbolication unit could not be written back, skipping"
            );
        }
    }
}

/// Run the full encode, deobfuscate, decode round trip for a session
pub async fn symbolicate(
    session: &mut Session,
    mapping_key: &str,
    deobfuscator: &dyn Deobfuscator,
) -> Result<()> {
    let (codec_map, units) = encode(session);
    if units.is_empty() {
        return Ok(());
    }

    debug!(
        session_id = %session.session_id,
        units = units.len(),
        "sending units for symbolication"
    );

    let request = SymbolicationRequest {
        id: session.session_id,
        app_id: session.app_id,
        mapping_type: MAPPING_TYPE_PROGUARD.to_string(),
        key: mapping_key.to_string(),
        data: units,
    };

    let returned = deobfuscator
        .deobfuscate(&request)
        .await
        .map_err(|e| match e {
            IngestError::Symbolication(_) => e,
            other => IngestError::symbolication(other.to_string()),
        })?;

    decode(session, &codec_map, &returned);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        Anr, AppExit, ColdLaunch, Exception, ExceptionUnit, Launch, LifecycleActivity,
        LifecycleFragment, LowMemory, Thread,
    };
    use crate::memory::MockDeobfuscator;

    fn frame(class: &str, method: &str, file: &str, line: i32) -> Frame {
        Frame {
            line_num: line,
            col_num: 7,
            module_name: Some("base.apk".to_string()),
            file_name: Some(file.to_string()),
            class_name: Some(class.to_string()),
            method_name: Some(method.to_string()),
        }
    }

    fn obfuscated_exception() -> Event {
        Event::new(EventPayload::Exception {
            exception: Exception {
                thread_name: "main".to_string(),
                exceptions: vec![ExceptionUnit {
                    kind: "a.b.c".to_string(),
                    message: "boom".to_string(),
                    frames: vec![frame("a.a.a", "b", "SourceFile", 12)],
                }],
                threads: vec![Thread {
                    name: "main".to_string(),
                    frames: vec![frame("a.a.a", "c", "SourceFile", 30)],
                }],
                ..Default::default()
            },
        })
    }

    fn session_with(events: Vec<Event>) -> Session {
        let mut session = Session::new(Uuid::now_v7(), Uuid::now_v7());
        session.events = events;
        session
    }

    #[test]
    fn test_frame_line_round_trip() {
        let line = marshal_frame(&frame("com.example.Main", "run", "Main.kt", 42));
        assert_eq!(line, "\tat com.example.Main.run(Main.kt:42)");

        let parsed = unmarshal_frame(&line).unwrap();
        assert_eq!(parsed.class_name.as_deref(), Some("com.example.Main"));
        assert_eq!(parsed.method_name.as_deref(), Some("run"));
        assert_eq!(parsed.file_name.as_deref(), Some("Main.kt"));
        assert_eq!(parsed.line_num, 42);
        assert_eq!(parsed.module_name, None);
    }

    #[test]
    fn test_unmarshal_partial_frames() {
        let parsed = unmarshal_frame("\tat com.example.Main.run").unwrap();
        assert_eq!(parsed.method_name.as_deref(), Some("run"));
        assert_eq!(parsed.file_name, None);

        let parsed = unmarshal_frame("\tat a.b(Unknown Source)").unwrap();
        assert_eq!(parsed.file_name.as_deref(), Some("Unknown Source"));
        assert_eq!(parsed.line_num, 0);

        let parsed = unmarshal_frame("\tat com.example.Main.run(42)").unwrap();
        assert_eq!(parsed.file_name, None);
        assert_eq!(parsed.line_num, 42);

        assert!(unmarshal_frame("com.example.Main.run").is_none());
        assert!(unmarshal_frame("\tat a.b(c(d))").is_none());
    }

    #[test]
    fn test_partial_frames_survive_untouched_round_trip() {
        let partial = vec![
            Frame {
                line_num: 42,
                class_name: Some("com.example.Main".to_string()),
                method_name: Some("run".to_string()),
                ..Default::default()
            },
            Frame {
                file_name: Some("Main.kt".to_string()),
                method_name: Some("run".to_string()),
                ..Default::default()
            },
            Frame {
                line_num: 7,
                class_name: Some("com.example.Main".to_string()),
                ..Default::default()
            },
            Frame {
                method_name: Some("lambda$0".to_string()),
                ..Default::default()
            },
            Frame {
                file_name: Some("404".to_string()),
                class_name: Some("a.b".to_string()),
                method_name: Some("c".to_string()),
                ..Default::default()
            },
        ];
        let mut session = session_with(vec![Event::new(EventPayload::Anr {
            anr: Anr {
                thread_name: "main".to_string(),
                exceptions: vec![ExceptionUnit {
                    kind: "AnrError".to_string(),
                    frames: partial.clone(),
                    ..Default::default()
                }],
                threads: vec![Thread {
                    name: "main".to_string(),
                    frames: partial.clone(),
                }],
                ..Default::default()
            },
        })]);
        let before = session.clone();

        let (codec_map, units) = encode(&session);
        decode(&mut session, &codec_map, &units);

        assert_eq!(session, before);
    }

    #[test]
    fn test_encode_addresses() {
        let session = session_with(vec![
            Event::new(EventPayload::LowMemory {
                low_memory: LowMemory::default(),
            }),
            obfuscated_exception(),
        ]);
        let (codec_map, units) = encode(&session);

        assert_eq!(units.len(), 3);
        let fields: Vec<CodecField> = units.iter().map(|u| codec_map[&u.id].field).collect();
        assert_eq!(
            fields,
            vec![
                CodecField::UnitFrames(0),
                CodecField::UnitType(0),
                CodecField::ThreadFrames(0)
            ]
        );
        assert!(units.iter().all(|u| codec_map[&u.id].event == 1));
        assert_eq!(units[0].values, vec!["\tat a.a.a.b(SourceFile:12)"]);
        assert_eq!(units[1].values, vec!["\tgeneric: a.b.c"]);
    }

    #[test]
    fn test_needs_symbolication() {
        let quiet = session_with(vec![Event::new(EventPayload::LowMemory {
            low_memory: LowMemory::default(),
        })]);
        assert!(!needs_symbolication(&quiet));

        let empty_trace = session_with(vec![Event::new(EventPayload::AppExit {
            app_exit: AppExit::default(),
        })]);
        assert!(!needs_symbolication(&empty_trace));

        let launch = session_with(vec![Event::new(EventPayload::WarmLaunch {
            warm_launch: Launch {
                launched_activity: "a.b".to_string(),
                ..Default::default()
            },
        })]);
        assert!(needs_symbolication(&launch));
    }

    #[test]
    fn test_scalar_round_trip_touches_only_its_field() {
        let mut session = session_with(vec![Event::new(EventPayload::LifecycleActivity {
            lifecycle_activity: LifecycleActivity {
                kind: "created".to_string(),
                class_name: "a.a.a".to_string(),
                intent: "a.a.a".to_string(),
                saved_instance_state: false,
            },
        })]);
        let before = session.clone();

        let (codec_map, units) = encode(&session);
        assert_eq!(units.len(), 1);
        let returned = vec![SymbolicationUnit {
            id: units[0].id,
            values: vec![format!("{GENERIC_PREFIX}com.example.Main")],
        }];
        decode(&mut session, &codec_map, &returned);

        match &session.events[0].payload {
            EventPayload::LifecycleActivity { lifecycle_activity } => {
                assert_eq!(lifecycle_activity.class_name, "com.example.Main");
                assert_eq!(lifecycle_activity.intent, "a.a.a");
                assert_eq!(lifecycle_activity.kind, "created");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(session.events[0].timestamp, before.events[0].timestamp);
        assert_eq!(session.resource, before.resource);
    }

    #[test]
    fn test_fragment_encodes_class_and_parent() {
        let mut session = session_with(vec![Event::new(EventPayload::LifecycleFragment {
            lifecycle_fragment: LifecycleFragment {
                kind: "attached".to_string(),
                class_name: "a.b".to_string(),
                parent_activity: "a.c".to_string(),
                tag: String::new(),
            },
        })]);
        let (codec_map, units) = encode(&session);
        assert_eq!(units.len(), 2);

        let returned: Vec<SymbolicationUnit> = units
            .iter()
            .map(|u| SymbolicationUnit {
                id: u.id,
                values: vec![u.values[0].replace("a.b", "com.example.CartFragment").replace("a.c", "com.example.MainActivity")],
            })
            .collect();
        decode(&mut session, &codec_map, &returned);

        match &session.events[0].payload {
            EventPayload::LifecycleFragment { lifecycle_fragment } => {
                assert_eq!(lifecycle_fragment.class_name, "com.example.CartFragment");
                assert_eq!(lifecycle_fragment.parent_activity, "com.example.MainActivity");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_frames_merge_positionally() {
        let mut session = session_with(vec![obfuscated_exception()]);
        let (codec_map, units) = encode(&session);

        let returned: Vec<SymbolicationUnit> = units
            .iter()
            .map(|u| SymbolicationUnit {
                id: u.id,
                values: u
                    .values
                    .iter()
                    .map(|v| {
                        v.replace("a.a.a.b(SourceFile:12)", "com.example.Main.onCreate(Main.kt:12)")
                            .replace("a.a.a.c(SourceFile:30)", "com.example.Main.loop(Main.kt:30)")
                            .replace("a.b.c", "com.example.CheckoutException")
                    })
                    .collect(),
            })
            .collect();
        decode(&mut session, &codec_map, &returned);

        let exception = session.events[0].exception().unwrap();
        let top = &exception.exceptions[0].frames[0];
        assert_eq!(top.class_name.as_deref(), Some("com.example.Main"));
        assert_eq!(top.method_name.as_deref(), Some("onCreate"));
        assert_eq!(top.file_name.as_deref(), Some("Main.kt"));
        assert_eq!(top.module_name.as_deref(), Some("base.apk"));
        assert_eq!(top.col_num, 7);
        assert_eq!(exception.exceptions[0].kind, "com.example.CheckoutException");
        assert_eq!(exception.exceptions[0].message, "boom");
        assert_eq!(
            exception.threads[0].frames[0].method_name.as_deref(),
            Some("loop")
        );
    }

    #[test]
    fn test_frames_replaced_when_count_changes() {
        let mut session = session_with(vec![obfuscated_exception()]);
        let (codec_map, units) = encode(&session);

        let returned = vec![SymbolicationUnit {
            id: units[0].id,
            values: vec![
                "\tat com.example.Inlined.inner(Main.kt:10)".to_string(),
                "\tat com.example.Main.onCreate(Main.kt:12)".to_string(),
            ],
        }];
        decode(&mut session, &codec_map, &returned);

        let frames = &session.events[0].exception().unwrap().exceptions[0].frames;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].class_name.as_deref(), Some("com.example.Inlined"));
        assert_eq!(frames[0].module_name, None);
    }

    #[test]
    fn test_unknown_units_are_ignored() {
        let mut session = session_with(vec![obfuscated_exception()]);
        let before = session.clone();
        let (codec_map, _) = encode(&session);

        decode(
            &mut session,
            &codec_map,
            &[SymbolicationUnit {
                id: Uuid::new_v4(),
                values: vec![format!("{GENERIC_PREFIX}x")],
            }],
        );
        assert_eq!(session, before);
    }

    #[test]
    fn test_mismatched_address_is_ignored() {
        let mut session = session_with(vec![Event::new(EventPayload::ColdLaunch {
            cold_launch: ColdLaunch {
                launched_activity: "a.a".to_string(),
                ..Default::default()
            },
        })]);
        let before = session.clone();
        let id = Uuid::new_v4();
        let mut codec_map = CodecMap::new();
        codec_map.insert(
            id,
            CodecAddress {
                event: 0,
                field: CodecField::AppExitTrace,
            },
        );
        decode(
            &mut session,
            &codec_map,
            &[SymbolicationUnit {
                id,
                values: vec![format!("{GENERIC_PREFIX}x")],
            }],
        );
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn test_symbolicate_with_deobfuscator() {
        let mut session = session_with(vec![
            obfuscated_exception(),
            Event::new(EventPayload::Anr {
                anr: Anr {
                    thread_name: "main".to_string(),
                    exceptions: vec![ExceptionUnit {
                        kind: "a.b.c".to_string(),
                        message: String::new(),
                        frames: vec![frame("a.a.a", "b", "SourceFile", 12)],
                    }],
                    threads: vec![],
                    ..Default::default()
                },
            }),
        ]);
        let deobfuscator = MockDeobfuscator::new()
            .with_mapping("a.a.a", "com.example.Main")
            .with_mapping("a.b.c", "com.example.CheckoutException");

        symbolicate(&mut session, "mapping-key", &deobfuscator)
            .await
            .unwrap();

        let requests = deobfuscator.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].key, "mapping-key");
        assert_eq!(requests[0].mapping_type, "proguard");
        assert_eq!(requests[0].id, session.session_id);

        let exception = session.events[0].exception().unwrap();
        assert_eq!(exception.exceptions[0].kind, "com.example.CheckoutException");
        assert_eq!(
            exception.exceptions[0].frames[0].class_name.as_deref(),
            Some("com.example.Main")
        );
        let anr = session.events[1].anr().unwrap();
        assert_eq!(anr.exceptions[0].kind, "com.example.CheckoutException");
    }

    #[tokio::test]
    async fn test_symbolicate_failure_leaves_session_untouched() {
        let mut session = session_with(vec![obfuscated_exception()]);
        let before = session.clone();
        let deobfuscator = MockDeobfuscator::failing();

        let err = symbolicate(&mut session, "mapping-key", &deobfuscator)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Symbolication(_)));
        assert_eq!(session, before);
    }
}
