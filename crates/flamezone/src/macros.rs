//! Instrumentation macros.
//!
//! Host code instruments through these macros so the `profiler` feature can
//! remove every call site. With the feature off, [`Profiler`](crate::Profiler)
//! is `()` and the macros expand to nothing but a borrow of that unit value.

/// Create the profiler handle for the host.
///
/// `profiler!()` writes `profiler.json`; `profiler!(config)` takes a
/// [`WriterConfig`](crate::WriterConfig). The handle flushes when dropped.
#[cfg(feature = "profiler")]
#[macro_export]
macro_rules! profiler {
    () => {
        $crate::TraceRegistry::with_defaults()
    };
    ($config:expr $(,)?) => {
        $crate::TraceRegistry::new($config)
    };
}

/// Time the rest of the enclosing block as a zone.
///
/// ```ignore
/// flamezone::zone!(profiler, "load");
/// flamezone::zone!(profiler, "read", "io");
/// ```
#[cfg(feature = "profiler")]
#[macro_export]
macro_rules! zone {
    ($profiler:expr, $name:expr $(,)?) => {
        let _flamezone_zone = $crate::Zone::open(&$profiler, $name);
    };
    ($profiler:expr, $name:expr, $category:expr $(,)?) => {
        let _flamezone_zone = $crate::Zone::with_category(&$profiler, $name, $category);
    };
}

/// Record a metadata entry.
#[cfg(feature = "profiler")]
#[macro_export]
macro_rules! metadata {
    ($profiler:expr, $title:expr, $value:expr $(,)?) => {
        $profiler.record_metadata($title, $value)
    };
}

#[cfg(not(feature = "profiler"))]
#[macro_export]
macro_rules! profiler {
    ($($config:expr)? $(,)?) => {
        ()
    };
}

#[cfg(not(feature = "profiler"))]
#[macro_export]
macro_rules! zone {
    ($profiler:expr, $($rest:tt)*) => {
        let _ = &$profiler;
    };
}

#[cfg(not(feature = "profiler"))]
#[macro_export]
macro_rules! metadata {
    ($profiler:expr, $($rest:tt)*) => {{
        let _ = &$profiler;
    }};
}
