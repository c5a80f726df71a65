// Session validation
//
// Validation is pure and ordered: the first violation found is returned. Per event the
// order is: type, timestamp, thread name, kind-specific required fields, string lengths,
// attribute count. Lengths are measured in characters, not bytes.

use thiserror::Error;

use crate::event::{is_zero_instant, CrashPayload, Event, EventPayload};
use crate::resource::Resource;
use crate::session::{Attachment, Session};

/// Maximum number of attributes per event
pub const MAX_ATTRIBUTE_COUNT: usize = 10;

const MAX_THREAD_NAME_CHARS: usize = 64;
const MAX_DEVICE_LOCALE_CHARS: usize = 64;
const MAX_APP_EXIT_REASON_CHARS: usize = 64;
const MAX_APP_EXIT_IMPORTANCE_CHARS: usize = 32;
const MAX_SEVERITY_TEXT_CHARS: usize = 10;
const MAX_GESTURE_TARGET_CHARS: usize = 128;
const MAX_GESTURE_TARGET_ID_CHARS: usize = 128;
const MAX_GESTURE_SCROLL_DIRECTION_CHARS: usize = 8;
const MAX_LIFECYCLE_TYPE_CHARS: usize = 32;
const MAX_LIFECYCLE_CLASS_NAME_CHARS: usize = 128;
const MAX_LAUNCHED_ACTIVITY_CHARS: usize = 128;
const MAX_NETWORK_TYPE_CHARS: usize = 16;
const MAX_NETWORK_GENERATION_CHARS: usize = 8;
const MAX_NETWORK_PROVIDER_CHARS: usize = 64;
const MAX_HTTP_METHOD_CHARS: usize = 16;
const MAX_HTTP_CLIENT_CHARS: usize = 32;
const MAX_TRIM_MEMORY_LEVEL_CHARS: usize = 64;
const MAX_ROUTE_CHARS: usize = 128;

const MAX_RESOURCE_DEVICE_CHARS: usize = 32;
const MAX_RESOURCE_OS_CHARS: usize = 32;
const MAX_RESOURCE_APP_VERSION_CHARS: usize = 128;
const MAX_RESOURCE_APP_BUILD_CHARS: usize = 32;
const MAX_RESOURCE_APP_UNIQUE_ID_CHARS: usize = 128;
const MAX_RESOURCE_SDK_VERSION_CHARS: usize = 16;

const MAX_ATTACHMENT_NAME_CHARS: usize = 256;
const MAX_ATTACHMENT_TYPE_CHARS: usize = 32;
const MAX_ATTACHMENT_EXTENSION_CHARS: usize = 16;

/// A validation failure naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Path of the offending field, e.g. `events[].cold_launch.launched_activity`
    pub field: String,
    /// Human readable description
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn too_long(field: &str, max: usize) -> Self {
        Self::new(
            field,
            format!("\"{field}\" exceeds maximum allowed characters of ({max})"),
        )
    }

    fn invalid(field: &str, kind: &str) -> Self {
        Self::new(field, format!("{kind} event is invalid"))
    }
}

type Check = std::result::Result<(), ValidationError>;

fn max_chars(field: &str, value: &str, max: usize) -> Check {
    if value.chars().count() > max {
        return Err(ValidationError::too_long(field, max));
    }
    Ok(())
}

fn require(ok: bool, field: &str, message: impl Into<String>) -> Check {
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(field, message))
    }
}

/// Validate the whole session: resource, then every event, then every attachment
pub fn validate_session(session: &Session) -> Check {
    validate_resource(&session.resource)?;
    for event in &session.events {
        validate_event(event)?;
    }
    for attachment in &session.attachments {
        validate_attachment(attachment)?;
    }
    Ok(())
}

pub fn validate_resource(resource: &Resource) -> Check {
    max_chars(
        "resource.device_name",
        &resource.device_name,
        MAX_RESOURCE_DEVICE_CHARS,
    )?;
    max_chars(
        "resource.device_model",
        &resource.device_model,
        MAX_RESOURCE_DEVICE_CHARS,
    )?;
    max_chars(
        "resource.device_manufacturer",
        &resource.device_manufacturer,
        MAX_RESOURCE_DEVICE_CHARS,
    )?;
    max_chars(
        "resource.device_type",
        &resource.device_type,
        MAX_RESOURCE_DEVICE_CHARS,
    )?;
    max_chars("resource.os_name", &resource.os_name, MAX_RESOURCE_OS_CHARS)?;
    max_chars(
        "resource.os_version",
        &resource.os_version,
        MAX_RESOURCE_OS_CHARS,
    )?;
    max_chars("resource.platform", &resource.platform, MAX_RESOURCE_OS_CHARS)?;
    max_chars(
        "resource.app_version",
        &resource.app_version,
        MAX_RESOURCE_APP_VERSION_CHARS,
    )?;
    max_chars(
        "resource.app_build",
        &resource.app_build,
        MAX_RESOURCE_APP_BUILD_CHARS,
    )?;
    max_chars(
        "resource.app_unique_id",
        &resource.app_unique_id,
        MAX_RESOURCE_APP_UNIQUE_ID_CHARS,
    )?;
    max_chars(
        "resource.sdk_version",
        &resource.sdk_version,
        MAX_RESOURCE_SDK_VERSION_CHARS,
    )?;
    max_chars(
        "resource.network_type",
        &resource.network_type,
        MAX_NETWORK_TYPE_CHARS,
    )?;
    max_chars(
        "resource.network_generation",
        &resource.network_generation,
        MAX_NETWORK_GENERATION_CHARS,
    )?;
    max_chars(
        "resource.network_provider",
        &resource.network_provider,
        MAX_NETWORK_PROVIDER_CHARS,
    )?;
    max_chars(
        "resource.device_locale",
        &resource.device_locale,
        MAX_DEVICE_LOCALE_CHARS,
    )
}

pub fn validate_event(event: &Event) -> Check {
    if matches!(event.payload, EventPayload::Unknown) {
        return Err(ValidationError::new(
            "events[].type",
            "\"events[].type\" is not a valid type",
        ));
    }
    require(
        !is_zero_instant(&event.timestamp),
        "events[].timestamp",
        "events[].timestamp is invalid. Must be a valid ISO 8601 timestamp",
    )?;
    require(
        !event.thread_name.is_empty(),
        "events[].thread_name",
        "events[].thread_name is invalid",
    )?;

    validate_required(&event.payload)?;

    max_chars(
        "events[].thread_name",
        &event.thread_name,
        MAX_THREAD_NAME_CHARS,
    )?;
    validate_lengths(&event.payload)?;

    if event.attributes.len() > MAX_ATTRIBUTE_COUNT {
        return Err(ValidationError::new(
            "events[].attributes",
            format!("\"events[].attributes\" exceeds maximum count of ({MAX_ATTRIBUTE_COUNT})"),
        ));
    }
    Ok(())
}

fn crash_is_complete(payload: &impl CrashPayload) -> bool {
    !payload.units().is_empty()
        && !payload.threads().is_empty()
        && !payload.thread_name().is_empty()
}

fn validate_required(payload: &EventPayload) -> Check {
    match payload {
        EventPayload::Exception { exception } => require(
            crash_is_complete(exception),
            "events[].exception",
            "exception event is invalid",
        ),
        EventPayload::Anr { anr } => require(
            crash_is_complete(anr),
            "events[].anr",
            "anr event is invalid",
        ),
        EventPayload::AppExit { app_exit } => {
            let ok = !app_exit.reason.is_empty()
                && !app_exit.importance.is_empty()
                && !app_exit.process_name.is_empty()
                && !app_exit.pid.is_empty()
                && !is_zero_instant(&app_exit.timestamp);
            require(ok, "events[].app_exit", "app_exit event is invalid")
        }
        EventPayload::String { string } => {
            require(!string.string.is_empty(), "events[].string", "string event is invalid")
        }
        EventPayload::GestureClick { gesture_click } => {
            if gesture_click.x < 0.0 || gesture_click.y < 0.0 {
                return Err(ValidationError::invalid("events[].gesture_click", "gesture_click"));
            }
            Ok(())
        }
        EventPayload::GestureLongClick { gesture_long_click } => {
            if gesture_long_click.x < 0.0 || gesture_long_click.y < 0.0 {
                return Err(ValidationError::invalid(
                    "events[].gesture_long_click",
                    "gesture_long_click",
                ));
            }
            Ok(())
        }
        EventPayload::GestureScroll { gesture_scroll } => {
            if gesture_scroll.x < 0.0 || gesture_scroll.y < 0.0 {
                return Err(ValidationError::invalid(
                    "events[].gesture_scroll",
                    "gesture_scroll",
                ));
            }
            Ok(())
        }
        EventPayload::LifecycleActivity { lifecycle_activity } => require(
            !lifecycle_activity.kind.is_empty() && !lifecycle_activity.class_name.is_empty(),
            "events[].lifecycle_activity",
            "lifecycle_activity event is invalid",
        ),
        EventPayload::LifecycleFragment { lifecycle_fragment } => require(
            !lifecycle_fragment.kind.is_empty() && !lifecycle_fragment.class_name.is_empty(),
            "events[].lifecycle_fragment",
            "lifecycle_fragment event is invalid",
        ),
        EventPayload::LifecycleApp { lifecycle_app } => require(
            !lifecycle_app.kind.is_empty(),
            "events[].lifecycle_app",
            "lifecycle_app event is invalid",
        ),
        EventPayload::ColdLaunch { cold_launch } => {
            require(
                cold_launch.process_start_uptime > 0
                    || cold_launch.process_start_requested_uptime > 0
                    || cold_launch.content_provider_attach_uptime > 0,
                "events[].cold_launch",
                "one of cold_launch.process_start_uptime, cold_launch.process_start_requested_uptime, cold_launch.content_provider_attach_uptime must be greater than 0",
            )?;
            require(
                cold_launch.on_next_draw_uptime > 0,
                "events[].cold_launch.on_next_draw_uptime",
                "cold_launch.on_next_draw_uptime must be greater than 0",
            )?;
            require(
                !cold_launch.launched_activity.is_empty(),
                "events[].cold_launch.launched_activity",
                "cold_launch.launched_activity must not be empty",
            )
        }
        EventPayload::WarmLaunch { warm_launch: launch } => validate_launch("warm_launch", launch),
        EventPayload::HotLaunch { hot_launch: launch } => validate_launch("hot_launch", launch),
        EventPayload::NetworkChange { network_change } => require(
            !network_change.network_type.is_empty(),
            "events[].network_change.network_type",
            "network_change.network_type must not be empty",
        ),
        EventPayload::Http { http } => {
            require(
                !http.url.is_empty(),
                "events[].http.url",
                "http.url must not be empty",
            )?;
            require(
                !http.method.is_empty(),
                "events[].http.method",
                "http.method must not be empty",
            )
        }
        EventPayload::MemoryUsage { memory_usage } => require(
            memory_usage.interval_config > 0,
            "events[].memory_usage.interval_config",
            "memory_usage.interval_config must be greater than 0",
        ),
        EventPayload::LowMemory { .. } => Ok(()),
        EventPayload::TrimMemory { trim_memory } => require(
            !trim_memory.level.is_empty(),
            "events[].trim_memory.level",
            "trim_memory.level must not be empty",
        ),
        EventPayload::CpuUsage { cpu_usage } => {
            require(
                cpu_usage.num_cores > 0,
                "events[].cpu_usage.num_cores",
                "cpu_usage.num_cores must be greater than 0",
            )?;
            require(
                cpu_usage.clock_speed > 0,
                "events[].cpu_usage.clock_speed",
                "cpu_usage.clock_speed must be greater than 0",
            )?;
            require(
                cpu_usage.interval_config > 0,
                "events[].cpu_usage.interval_config",
                "cpu_usage.interval_config must be greater than 0",
            )
        }
        EventPayload::Navigation { navigation } => require(
            !navigation.route.is_empty(),
            "events[].navigation.route",
            "navigation.route must not be empty",
        ),
        EventPayload::Unknown => Ok(()),
    }
}

fn validate_launch(kind: &str, launch: &crate::event::Launch) -> Check {
    require(
        launch.app_visible_uptime > 0,
        &format!("events[].{kind}.app_visible_uptime"),
        format!("{kind}.app_visible_uptime must be greater than 0"),
    )?;
    require(
        launch.on_next_draw_uptime > 0,
        &format!("events[].{kind}.on_next_draw_uptime"),
        format!("{kind}.on_next_draw_uptime must be greater than 0"),
    )?;
    require(
        !launch.launched_activity.is_empty(),
        &format!("events[].{kind}.launched_activity"),
        format!("{kind}.launched_activity must not be empty"),
    )
}

fn validate_lengths(payload: &EventPayload) -> Check {
    match payload {
        EventPayload::Exception { exception } => {
            max_chars(
                "events[].exception.thread_name",
                &exception.thread_name,
                MAX_THREAD_NAME_CHARS,
            )?;
            max_chars(
                "events[].exception.device_locale",
                &exception.device_locale,
                MAX_DEVICE_LOCALE_CHARS,
            )
        }
        EventPayload::Anr { anr } => {
            max_chars(
                "events[].anr.thread_name",
                &anr.thread_name,
                MAX_THREAD_NAME_CHARS,
            )?;
            max_chars(
                "events[].anr.device_locale",
                &anr.device_locale,
                MAX_DEVICE_LOCALE_CHARS,
            )
        }
        EventPayload::AppExit { app_exit } => {
            max_chars(
                "events[].app_exit.reason",
                &app_exit.reason,
                MAX_APP_EXIT_REASON_CHARS,
            )?;
            max_chars(
                "events[].app_exit.importance",
                &app_exit.importance,
                MAX_APP_EXIT_IMPORTANCE_CHARS,
            )
        }
        EventPayload::String { string } => max_chars(
            "events[].string.severity_text",
            &string.severity_text,
            MAX_SEVERITY_TEXT_CHARS,
        ),
        EventPayload::GestureClick {
            gesture_click: gesture,
        }
        | EventPayload::GestureLongClick {
            gesture_long_click: gesture,
        } => {
            let kind = payload.type_name();
            max_chars(
                &format!("events[].{kind}.target"),
                &gesture.target,
                MAX_GESTURE_TARGET_CHARS,
            )?;
            max_chars(
                &format!("events[].{kind}.target_id"),
                &gesture.target_id,
                MAX_GESTURE_TARGET_ID_CHARS,
            )
        }
        EventPayload::GestureScroll { gesture_scroll } => {
            max_chars(
                "events[].gesture_scroll.target",
                &gesture_scroll.target,
                MAX_GESTURE_TARGET_CHARS,
            )?;
            max_chars(
                "events[].gesture_scroll.target_id",
                &gesture_scroll.target_id,
                MAX_GESTURE_TARGET_ID_CHARS,
            )?;
            max_chars(
                "events[].gesture_scroll.direction",
                &gesture_scroll.direction,
                MAX_GESTURE_SCROLL_DIRECTION_CHARS,
            )
        }
        EventPayload::LifecycleActivity { lifecycle_activity } => {
            max_chars(
                "events[].lifecycle_activity.type",
                &lifecycle_activity.kind,
                MAX_LIFECYCLE_TYPE_CHARS,
            )?;
            max_chars(
                "events[].lifecycle_activity.class_name",
                &lifecycle_activity.class_name,
                MAX_LIFECYCLE_CLASS_NAME_CHARS,
            )
        }
        EventPayload::LifecycleFragment { lifecycle_fragment } => {
            max_chars(
                "events[].lifecycle_fragment.type",
                &lifecycle_fragment.kind,
                MAX_LIFECYCLE_TYPE_CHARS,
            )?;
            max_chars(
                "events[].lifecycle_fragment.class_name",
                &lifecycle_fragment.class_name,
                MAX_LIFECYCLE_CLASS_NAME_CHARS,
            )
        }
        EventPayload::LifecycleApp { lifecycle_app } => max_chars(
            "events[].lifecycle_app.type",
            &lifecycle_app.kind,
            MAX_LIFECYCLE_TYPE_CHARS,
        ),
        EventPayload::ColdLaunch { cold_launch } => max_chars(
            "events[].cold_launch.launched_activity",
            &cold_launch.launched_activity,
            MAX_LAUNCHED_ACTIVITY_CHARS,
        ),
        EventPayload::WarmLaunch { warm_launch: launch }
        | EventPayload::HotLaunch { hot_launch: launch } => max_chars(
            &format!("events[].{}.launched_activity", payload.type_name()),
            &launch.launched_activity,
            MAX_LAUNCHED_ACTIVITY_CHARS,
        ),
        EventPayload::NetworkChange { network_change } => {
            max_chars(
                "events[].network_change.network_type",
                &network_change.network_type,
                MAX_NETWORK_TYPE_CHARS,
            )?;
            max_chars(
                "events[].network_change.previous_network_type",
                &network_change.previous_network_type,
                MAX_NETWORK_TYPE_CHARS,
            )?;
            max_chars(
                "events[].network_change.network_generation",
                &network_change.network_generation,
                MAX_NETWORK_GENERATION_CHARS,
            )?;
            max_chars(
                "events[].network_change.previous_network_generation",
                &network_change.previous_network_generation,
                MAX_NETWORK_GENERATION_CHARS,
            )?;
            max_chars(
                "events[].network_change.network_provider",
                &network_change.network_provider,
                MAX_NETWORK_PROVIDER_CHARS,
            )
        }
        EventPayload::Http { http } => {
            max_chars(
                "events[].http.method",
                &http.method,
                MAX_HTTP_METHOD_CHARS,
            )?;
            max_chars(
                "events[].http.client",
                &http.client,
                MAX_HTTP_CLIENT_CHARS,
            )
        }
        EventPayload::TrimMemory { trim_memory } => max_chars(
            "events[].trim_memory.level",
            &trim_memory.level,
            MAX_TRIM_MEMORY_LEVEL_CHARS,
        ),
        EventPayload::Navigation { navigation } => max_chars(
            "events[].navigation.route",
            &navigation.route,
            MAX_ROUTE_CHARS,
        ),
        EventPayload::MemoryUsage { .. }
        | EventPayload::LowMemory { .. }
        | EventPayload::CpuUsage { .. }
        | EventPayload::Unknown => Ok(()),
    }
}

pub fn validate_attachment(attachment: &Attachment) -> Check {
    require(
        !attachment.name.is_empty(),
        "attachments[].name",
        "attachments[].name must not be empty",
    )?;
    require(
        !attachment.kind.is_empty(),
        "attachments[].type",
        "attachments[].type must not be empty",
    )?;
    require(
        !attachment.blob.is_empty(),
        "attachments[].blob",
        "attachments[].blob must not be empty",
    )?;
    max_chars(
        "attachments[].name",
        &attachment.name,
        MAX_ATTACHMENT_NAME_CHARS,
    )?;
    max_chars(
        "attachments[].type",
        &attachment.kind,
        MAX_ATTACHMENT_TYPE_CHARS,
    )?;
    max_chars(
        "attachments[].extension",
        &attachment.extension,
        MAX_ATTACHMENT_EXTENSION_CHARS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        Anr, ColdLaunch, Exception, ExceptionUnit, Frame, GestureClick, Launch, LowMemory,
        Navigation, Thread,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn crash_units() -> (Vec<ExceptionUnit>, Vec<Thread>) {
        let frame = Frame {
            class_name: Some("a.a.a".to_string()),
            method_name: Some("b".to_string()),
            ..Default::default()
        };
        (
            vec![ExceptionUnit {
                kind: "NullPointerException".to_string(),
                message: String::new(),
                frames: vec![frame.clone()],
            }],
            vec![Thread {
                name: "main".to_string(),
                frames: vec![frame],
            }],
        )
    }

    fn exception_event(units: usize, threads: usize) -> Event {
        let (u, t) = crash_units();
        Event::new(EventPayload::Exception {
            exception: Exception {
                thread_name: "main".to_string(),
                exceptions: u.into_iter().cycle().take(units).collect(),
                threads: t.into_iter().cycle().take(threads).collect(),
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_exception_requires_units_and_threads() {
        let err = validate_event(&exception_event(0, 1)).unwrap_err();
        assert_eq!(err.to_string(), "exception event is invalid");
        assert_eq!(err.field, "events[].exception");

        let err = validate_event(&exception_event(1, 0)).unwrap_err();
        assert_eq!(err.to_string(), "exception event is invalid");

        assert!(validate_event(&exception_event(1, 1)).is_ok());
    }

    /// One valid payload per kind, with payloads that each lack one required field
    fn kind_table() -> Vec<(EventPayload, Vec<(EventPayload, &'static str)>)> {
        use crate::event::{
            AppExit, CpuUsage, GestureScroll, Http, LifecycleActivity, LifecycleApp,
            LifecycleFragment, LogString, MemoryUsage, NetworkChange, TrimMemory,
        };

        let (units, threads) = crash_units();
        let exception = Exception {
            thread_name: "main".to_string(),
            exceptions: units.clone(),
            threads: threads.clone(),
            ..Default::default()
        };
        let anr = Anr {
            thread_name: "main".to_string(),
            exceptions: units,
            threads,
            ..Default::default()
        };
        let app_exit = AppExit {
            reason: "ANR".to_string(),
            importance: "FOREGROUND".to_string(),
            process_name: "com.example.shop".to_string(),
            pid: "4242".to_string(),
            timestamp: Utc::now(),
            ..Default::default()
        };
        let click = GestureClick {
            target: "android.widget.Button".to_string(),
            x: 10.0,
            y: 20.0,
            ..Default::default()
        };
        let scroll = GestureScroll {
            direction: "up".to_string(),
            x: 10.0,
            y: 20.0,
            ..Default::default()
        };
        let activity = LifecycleActivity {
            kind: "created".to_string(),
            class_name: "com.example.MainActivity".to_string(),
            ..Default::default()
        };
        let fragment = LifecycleFragment {
            kind: "attached".to_string(),
            class_name: "com.example.CartFragment".to_string(),
            ..Default::default()
        };
        let cold = ColdLaunch {
            process_start_uptime: 100,
            on_next_draw_uptime: 300,
            launched_activity: "com.example.MainActivity".to_string(),
            ..Default::default()
        };
        let launch = Launch {
            app_visible_uptime: 100,
            on_next_draw_uptime: 200,
            launched_activity: "com.example.MainActivity".to_string(),
            ..Default::default()
        };
        let http = Http {
            url: "https://api.example.com/cart".to_string(),
            method: "GET".to_string(),
            client: "okhttp".to_string(),
            ..Default::default()
        };
        let cpu = CpuUsage {
            num_cores: 8,
            clock_speed: 100,
            interval_config: 1000,
            ..Default::default()
        };

        vec![
            (
                EventPayload::Exception { exception: exception.clone() },
                vec![
                    (
                        EventPayload::Exception {
                            exception: Exception { exceptions: vec![], ..exception.clone() },
                        },
                        "events[].exception",
                    ),
                    (
                        EventPayload::Exception {
                            exception: Exception { threads: vec![], ..exception.clone() },
                        },
                        "events[].exception",
                    ),
                    (
                        EventPayload::Exception {
                            exception: Exception { thread_name: String::new(), ..exception },
                        },
                        "events[].exception",
                    ),
                ],
            ),
            (
                EventPayload::Anr { anr: anr.clone() },
                vec![
                    (
                        EventPayload::Anr { anr: Anr { exceptions: vec![], ..anr.clone() } },
                        "events[].anr",
                    ),
                    (
                        EventPayload::Anr { anr: Anr { threads: vec![], ..anr.clone() } },
                        "events[].anr",
                    ),
                ],
            ),
            (
                EventPayload::AppExit { app_exit: app_exit.clone() },
                vec![
                    (
                        EventPayload::AppExit {
                            app_exit: AppExit { reason: String::new(), ..app_exit.clone() },
                        },
                        "events[].app_exit",
                    ),
                    (
                        EventPayload::AppExit {
                            app_exit: AppExit { importance: String::new(), ..app_exit.clone() },
                        },
                        "events[].app_exit",
                    ),
                    (
                        EventPayload::AppExit {
                            app_exit: AppExit { process_name: String::new(), ..app_exit.clone() },
                        },
                        "events[].app_exit",
                    ),
                    (
                        EventPayload::AppExit {
                            app_exit: AppExit { pid: String::new(), ..app_exit.clone() },
                        },
                        "events[].app_exit",
                    ),
                    (
                        EventPayload::AppExit {
                            app_exit: AppExit {
                                timestamp: crate::event::zero_instant(),
                                ..app_exit
                            },
                        },
                        "events[].app_exit",
                    ),
                ],
            ),
            (
                EventPayload::String {
                    string: LogString {
                        severity_text: "INFO".to_string(),
                        string: "cart opened".to_string(),
                    },
                },
                vec![(
                    EventPayload::String { string: LogString::default() },
                    "events[].string",
                )],
            ),
            (
                EventPayload::GestureClick { gesture_click: click.clone() },
                vec![(
                    EventPayload::GestureClick {
                        gesture_click: GestureClick { x: -1.0, ..click.clone() },
                    },
                    "events[].gesture_click",
                )],
            ),
            (
                EventPayload::GestureLongClick { gesture_long_click: click.clone() },
                vec![(
                    EventPayload::GestureLongClick {
                        gesture_long_click: GestureClick { y: -1.0, ..click },
                    },
                    "events[].gesture_long_click",
                )],
            ),
            (
                EventPayload::GestureScroll { gesture_scroll: scroll.clone() },
                vec![(
                    EventPayload::GestureScroll {
                        gesture_scroll: GestureScroll { y: -0.5, ..scroll },
                    },
                    "events[].gesture_scroll",
                )],
            ),
            (
                EventPayload::LifecycleActivity { lifecycle_activity: activity.clone() },
                vec![
                    (
                        EventPayload::LifecycleActivity {
                            lifecycle_activity: LifecycleActivity {
                                kind: String::new(),
                                ..activity.clone()
                            },
                        },
                        "events[].lifecycle_activity",
                    ),
                    (
                        EventPayload::LifecycleActivity {
                            lifecycle_activity: LifecycleActivity {
                                class_name: String::new(),
                                ..activity
                            },
                        },
                        "events[].lifecycle_activity",
                    ),
                ],
            ),
            (
                EventPayload::LifecycleFragment { lifecycle_fragment: fragment.clone() },
                vec![
                    (
                        EventPayload::LifecycleFragment {
                            lifecycle_fragment: LifecycleFragment {
                                kind: String::new(),
                                ..fragment.clone()
                            },
                        },
                        "events[].lifecycle_fragment",
                    ),
                    (
                        EventPayload::LifecycleFragment {
                            lifecycle_fragment: LifecycleFragment {
                                class_name: String::new(),
                                ..fragment
                            },
                        },
                        "events[].lifecycle_fragment",
                    ),
                ],
            ),
            (
                EventPayload::LifecycleApp {
                    lifecycle_app: LifecycleApp { kind: "foreground".to_string() },
                },
                vec![(
                    EventPayload::LifecycleApp { lifecycle_app: LifecycleApp::default() },
                    "events[].lifecycle_app",
                )],
            ),
            (
                EventPayload::ColdLaunch { cold_launch: cold.clone() },
                vec![
                    (
                        EventPayload::ColdLaunch {
                            cold_launch: ColdLaunch { process_start_uptime: 0, ..cold.clone() },
                        },
                        "events[].cold_launch",
                    ),
                    (
                        EventPayload::ColdLaunch {
                            cold_launch: ColdLaunch { on_next_draw_uptime: 0, ..cold.clone() },
                        },
                        "events[].cold_launch.on_next_draw_uptime",
                    ),
                    (
                        EventPayload::ColdLaunch {
                            cold_launch: ColdLaunch {
                                launched_activity: String::new(),
                                ..cold
                            },
                        },
                        "events[].cold_launch.launched_activity",
                    ),
                ],
            ),
            (
                EventPayload::WarmLaunch { warm_launch: launch.clone() },
                vec![
                    (
                        EventPayload::WarmLaunch {
                            warm_launch: Launch { app_visible_uptime: 0, ..launch.clone() },
                        },
                        "events[].warm_launch.app_visible_uptime",
                    ),
                    (
                        EventPayload::WarmLaunch {
                            warm_launch: Launch { on_next_draw_uptime: 0, ..launch.clone() },
                        },
                        "events[].warm_launch.on_next_draw_uptime",
                    ),
                    (
                        EventPayload::WarmLaunch {
                            warm_launch: Launch {
                                launched_activity: String::new(),
                                ..launch.clone()
                            },
                        },
                        "events[].warm_launch.launched_activity",
                    ),
                ],
            ),
            (
                EventPayload::HotLaunch { hot_launch: launch.clone() },
                vec![(
                    EventPayload::HotLaunch {
                        hot_launch: Launch { app_visible_uptime: 0, ..launch },
                    },
                    "events[].hot_launch.app_visible_uptime",
                )],
            ),
            (
                EventPayload::NetworkChange {
                    network_change: NetworkChange {
                        network_type: "wifi".to_string(),
                        previous_network_type: "cellular".to_string(),
                        ..Default::default()
                    },
                },
                vec![(
                    EventPayload::NetworkChange { network_change: NetworkChange::default() },
                    "events[].network_change.network_type",
                )],
            ),
            (
                EventPayload::Http { http: http.clone() },
                vec![
                    (
                        EventPayload::Http { http: Http { url: String::new(), ..http.clone() } },
                        "events[].http.url",
                    ),
                    (
                        EventPayload::Http { http: Http { method: String::new(), ..http } },
                        "events[].http.method",
                    ),
                ],
            ),
            (
                EventPayload::MemoryUsage {
                    memory_usage: MemoryUsage {
                        interval_config: 1000,
                        ..Default::default()
                    },
                },
                vec![(
                    EventPayload::MemoryUsage { memory_usage: MemoryUsage::default() },
                    "events[].memory_usage.interval_config",
                )],
            ),
            (
                EventPayload::LowMemory { low_memory: LowMemory::default() },
                vec![],
            ),
            (
                EventPayload::TrimMemory {
                    trim_memory: TrimMemory {
                        level: "TRIM_MEMORY_UI_HIDDEN".to_string(),
                    },
                },
                vec![(
                    EventPayload::TrimMemory { trim_memory: TrimMemory::default() },
                    "events[].trim_memory.level",
                )],
            ),
            (
                EventPayload::CpuUsage { cpu_usage: cpu.clone() },
                vec![
                    (
                        EventPayload::CpuUsage { cpu_usage: CpuUsage { num_cores: 0, ..cpu.clone() } },
                        "events[].cpu_usage.num_cores",
                    ),
                    (
                        EventPayload::CpuUsage { cpu_usage: CpuUsage { clock_speed: 0, ..cpu.clone() } },
                        "events[].cpu_usage.clock_speed",
                    ),
                    (
                        EventPayload::CpuUsage {
                            cpu_usage: CpuUsage { interval_config: 0, ..cpu },
                        },
                        "events[].cpu_usage.interval_config",
                    ),
                ],
            ),
            (
                EventPayload::Navigation {
                    navigation: Navigation { route: "checkout".to_string() },
                },
                vec![(
                    EventPayload::Navigation { navigation: Navigation::default() },
                    "events[].navigation.route",
                )],
            ),
        ]
    }

    #[test]
    fn test_every_kind_accepts_valid_and_rejects_missing_fields() {
        let table = kind_table();
        let kinds: std::collections::BTreeSet<&str> =
            table.iter().map(|(valid, _)| valid.type_name()).collect();
        assert_eq!(kinds.len(), 20);

        for (valid, broken) in table {
            let kind = valid.type_name();
            if let Err(e) = validate_event(&Event::new(valid)) {
                panic!("valid {kind} event rejected: {e}");
            }
            for (payload, field) in broken {
                let err = validate_event(&Event::new(payload)).unwrap_err();
                assert_eq!(err.field, field, "{kind}: {err}");
            }
        }

        let err = validate_event(&Event::new(EventPayload::Unknown)).unwrap_err();
        assert_eq!(err.field, "events[].type");
    }

    #[test]
    fn test_anr_requires_thread_name() {
        let (exceptions, threads) = crash_units();
        let event = Event::new(EventPayload::Anr {
            anr: Anr {
                exceptions,
                threads,
                ..Default::default()
            },
        });
        let err = validate_event(&event).unwrap_err();
        assert_eq!(err.to_string(), "anr event is invalid");
    }

    #[test]
    fn test_unknown_type_rejected_first() {
        let mut event = Event::new(EventPayload::Unknown);
        event.thread_name = String::new();
        let err = validate_event(&event).unwrap_err();
        assert_eq!(err.to_string(), "\"events[].type\" is not a valid type");
    }

    #[test]
    fn test_zero_timestamp_rejected_before_thread_name() {
        let mut event = Event::new(EventPayload::LowMemory {
            low_memory: LowMemory::default(),
        });
        event.timestamp = crate::event::zero_instant();
        event.thread_name = String::new();
        let err = validate_event(&event).unwrap_err();
        assert_eq!(err.field, "events[].timestamp");
    }

    #[test]
    fn test_empty_thread_name_rejected() {
        let mut event = exception_event(1, 1);
        event.thread_name = String::new();
        let err = validate_event(&event).unwrap_err();
        assert_eq!(err.to_string(), "events[].thread_name is invalid");
    }

    #[test]
    fn test_cold_launch_rules() {
        let mut launch = ColdLaunch {
            on_next_draw_uptime: 10,
            launched_activity: "MainActivity".to_string(),
            ..Default::default()
        };
        let event = |launch: &ColdLaunch| {
            Event::new(EventPayload::ColdLaunch {
                cold_launch: launch.clone(),
            })
        };

        let err = validate_event(&event(&launch)).unwrap_err();
        assert!(err.message.starts_with("one of cold_launch.process_start_uptime"));

        launch.content_provider_attach_uptime = 5;
        assert!(validate_event(&event(&launch)).is_ok());

        launch.on_next_draw_uptime = 0;
        let err = validate_event(&event(&launch)).unwrap_err();
        assert_eq!(err.message, "cold_launch.on_next_draw_uptime must be greater than 0");

        launch.on_next_draw_uptime = 10;
        launch.launched_activity = "x".repeat(129);
        let err = validate_event(&event(&launch)).unwrap_err();
        assert_eq!(
            err.message,
            "\"events[].cold_launch.launched_activity\" exceeds maximum allowed characters of (128)"
        );

        launch.launched_activity = "x".repeat(128);
        assert!(validate_event(&event(&launch)).is_ok());
    }

    #[test]
    fn test_warm_and_hot_launch_field_paths() {
        let event = Event::new(EventPayload::HotLaunch {
            hot_launch: Launch {
                on_next_draw_uptime: 10,
                launched_activity: "MainActivity".to_string(),
                ..Default::default()
            },
        });
        let err = validate_event(&event).unwrap_err();
        assert_eq!(err.field, "events[].hot_launch.app_visible_uptime");
        assert_eq!(err.message, "hot_launch.app_visible_uptime must be greater than 0");
    }

    #[test]
    fn test_negative_gesture_coordinates_rejected() {
        let event = Event::new(EventPayload::GestureLongClick {
            gesture_long_click: GestureClick {
                x: -1.0,
                y: 4.0,
                ..Default::default()
            },
        });
        let err = validate_event(&event).unwrap_err();
        assert_eq!(err.message, "gesture_long_click event is invalid");
    }

    #[test]
    fn test_lengths_counted_in_characters() {
        // 128 multi-byte characters fit, 129 do not
        let route = "é".repeat(128);
        let event = Event::new(EventPayload::Navigation {
            navigation: Navigation { route },
        });
        assert!(validate_event(&event).is_ok());

        let event = Event::new(EventPayload::Navigation {
            navigation: Navigation {
                route: "é".repeat(129),
            },
        });
        assert_eq!(
            validate_event(&event).unwrap_err().field,
            "events[].navigation.route"
        );
    }

    #[test]
    fn test_attribute_count_capped() {
        let mut event = exception_event(1, 1);
        for i in 0..MAX_ATTRIBUTE_COUNT {
            event.attributes.insert(format!("k{i}"), "v".to_string());
        }
        assert!(validate_event(&event).is_ok());

        event.attributes.insert("one_more".to_string(), "v".to_string());
        let err = validate_event(&event).unwrap_err();
        assert_eq!(err.message, "\"events[].attributes\" exceeds maximum count of (10)");
    }

    #[test]
    fn test_resource_limits() {
        let resource = Resource {
            network_generation: "5g-sa-nr-x".to_string(),
            ..Default::default()
        };
        let err = validate_resource(&resource).unwrap_err();
        assert_eq!(err.field, "resource.network_generation");
        assert!(validate_resource(&Resource::default()).is_ok());
    }

    #[test]
    fn test_attachment_rules() {
        let mut attachment = Attachment {
            id: Uuid::now_v7(),
            name: "screenshot".to_string(),
            extension: ".png".to_string(),
            kind: "screenshot".to_string(),
            timestamp: Utc::now(),
            blob: vec![1, 2, 3],
            key: String::new(),
            location: String::new(),
        };
        assert!(validate_attachment(&attachment).is_ok());

        attachment.blob.clear();
        assert_eq!(
            validate_attachment(&attachment).unwrap_err().field,
            "attachments[].blob"
        );
    }

    #[test]
    fn test_session_stops_at_first_bad_event() {
        let mut session = Session::new(Uuid::now_v7(), Uuid::now_v7());
        session.events.push(exception_event(1, 1));
        session.events.push(exception_event(0, 0));
        session.events.push(Event::new(EventPayload::Unknown));

        let err = validate_session(&session).unwrap_err();
        assert_eq!(err.message, "exception event is invalid");
    }
}
