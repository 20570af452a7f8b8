//! Log callback bridge.
//!
//! Host applications receive the controller's log output through a single
//! callback taking a message and a [`LogLevel`]. Internally everything logs
//! through `tracing`; [`CallbackLayer`] is a `tracing-subscriber` layer that
//! formats each event and hands it to whatever callback is currently
//! registered on its [`LogCallbackHandle`].
//!
//! ```
//! use olfactory_core::LogLevel;
//! use olfactory_device::logging::{CallbackLayer, LogCallbackHandle};
//! use std::sync::{Arc, Mutex};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let handle = LogCallbackHandle::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! handle.register(move |message: &str, level: LogLevel| {
//!     sink.lock().unwrap().push((message.to_string(), level));
//! });
//!
//! let subscriber = tracing_subscriber::registry().with(CallbackLayer::new(handle));
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::warn!(device = "dev1", "Cooling down");
//! });
//!
//! assert_eq!(
//!     seen.lock().unwrap().as_slice(),
//!     &[("Cooling down device=dev1".to_string(), LogLevel::Warn)]
//! );
//! ```

use olfactory_core::{Error, LogLevel, Result};
use std::fmt::{self, Write as _};
use std::sync::{Arc, RwLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, registry};

/// Callback receiving formatted log messages.
pub type LogCallback = Arc<dyn Fn(&str, LogLevel) + Send + Sync>;

/// Map a `tracing` level onto the callback's level scale.
///
/// `tracing` has no critical level, so errors stay errors.
pub fn log_level(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

struct CallbackSlot {
    callback: Option<LogCallback>,
    threshold: LogLevel,
}

/// Shared slot holding the registered callback and its level threshold.
///
/// Clones refer to the same slot.
#[derive(Clone)]
pub struct LogCallbackHandle {
    slot: Arc<RwLock<CallbackSlot>>,
}

impl LogCallbackHandle {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(CallbackSlot {
                callback: None,
                threshold: LogLevel::Trace,
            })),
        }
    }

    /// Register a callback, replacing the previous one.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&str, LogLevel) + Send + Sync + 'static,
    {
        self.write().callback = Some(Arc::new(callback));
    }

    pub fn clear(&self) {
        self.write().callback = None;
    }

    pub fn is_registered(&self) -> bool {
        self.read().callback.is_some()
    }

    /// Lowest level forwarded. [`LogLevel::Off`] forwards nothing.
    pub fn set_threshold(&self, threshold: LogLevel) {
        self.write().threshold = threshold;
    }

    pub fn threshold(&self) -> LogLevel {
        self.read().threshold
    }

    fn callback_for(&self, level: LogLevel) -> Option<LogCallback> {
        let slot = self.read();
        if slot.threshold == LogLevel::Off || level < slot.threshold {
            return None;
        }
        slot.callback.clone()
    }

    /// Forward a message if a callback is registered and the level passes.
    pub fn dispatch(&self, message: &str, level: LogLevel) {
        // Called outside the lock: the callback may log again
        if let Some(callback) = self.callback_for(level) {
            callback(message, level);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CallbackSlot> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CallbackSlot> {
        self.slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LogCallbackHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogCallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.read();
        f.debug_struct("LogCallbackHandle")
            .field("registered", &slot.callback.is_some())
            .field("threshold", &slot.threshold)
            .finish()
    }
}

/// Formats an event as `message key=value key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.message.is_empty() {
            return self.fields.trim_start().to_string();
        }
        self.message + &self.fields
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// `tracing-subscriber` layer forwarding events to a [`LogCallbackHandle`].
#[derive(Debug, Clone)]
pub struct CallbackLayer {
    handle: LogCallbackHandle,
}

impl CallbackLayer {
    pub fn new(handle: LogCallbackHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &LogCallbackHandle {
        &self.handle
    }
}

impl<S> Layer<S> for CallbackLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = log_level(event.metadata().level());
        if self.handle.callback_for(level).is_none() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.handle.dispatch(&visitor.finish(), level);
    }
}

/// Install a global subscriber that forwards to a callback handle.
///
/// `filter` uses `EnvFilter` directive syntax, e.g. `"olfactory=debug"`.
/// Pass the returned handle to
/// [`ControllerBuilder::log_handle`](crate::ControllerBuilder::log_handle)
/// so that `register_log_callback` reaches this subscriber.
///
/// # Errors
///
/// Returns `Error::Config` if the filter is invalid or a global subscriber
/// is already installed.
pub fn install(filter: &str) -> Result<LogCallbackHandle> {
    let env_filter = EnvFilter::try_new(filter)
        .map_err(|e| Error::Config(format!("Invalid log filter {filter:?}: {e}")))?;
    let handle = LogCallbackHandle::new();

    registry()
        .with(env_filter)
        .with(CallbackLayer::new(handle.clone()))
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already installed: {e}")))?;

    Ok(handle)
}
