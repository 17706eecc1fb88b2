//! Logging macros that forward to `tracing` when the `tracing` feature is on
//! and expand to nothing otherwise.

#[cfg(feature = "tracing")]
macro_rules! event {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!($($arg)+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! event {
    ($level:ident, $($arg:tt)+) => {{}};
}

pub(crate) use event;
