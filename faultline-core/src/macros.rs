/// Returns the application code version as an `Option<Cow<'static, str>>`.
///
/// This can be used with `Options` to set the code version from the
/// information supplied by cargo.
///
/// # Examples
///
/// ```
/// let _client = faultline_core::Client::with_options(faultline_core::Options {
///     code_version: faultline_core::release_version!(),
///     ..Default::default()
/// });
/// ```
#[macro_export]
macro_rules! release_version {
    () => {{
        option_env!("CARGO_PKG_NAME").and_then(|name| {
            option_env!("CARGO_PKG_VERSION")
                .map(|version| ::std::borrow::Cow::Owned(format!("{}@{}", name, version)))
        })
    }};
}

#[cfg(feature = "debug-logs")]
#[macro_export]
#[doc(hidden)]
macro_rules! faultline_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "faultline", $($arg)*)
    }
}

#[cfg(not(feature = "debug-logs"))]
#[macro_export]
#[doc(hidden)]
macro_rules! faultline_debug {
    ($($arg:tt)*) => {
        if $crate::current_client().map_or(false, |c| c.options().debug) {
            eprint!("[faultline] ");
            eprintln!($($arg)*);
        }
    }
}

/// Panics in debug builds and logs through `faultline_debug!` in non-debug builds.
#[macro_export]
#[doc(hidden)]
macro_rules! debug_panic_or_log {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        panic!($($arg)*);

        #[cfg(not(debug_assertions))]
        $crate::faultline_debug!($($arg)*);
    }};
}

/// If the condition is false, panics in debug builds and logs in non-debug builds.
#[macro_export]
#[doc(hidden)]
macro_rules! debug_assert_or_log {
    ($cond:expr $(,)?) => {{
        let condition = $cond;
        if !condition {
            $crate::debug_panic_or_log!("assertion failed: {}", stringify!($cond));
        }
    }};
    ($cond:expr, $($arg:tt)+) => {{
        let condition = $cond;
        if !condition {
            $crate::debug_panic_or_log!($($arg)+);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn debug_assert_or_log_does_not_panic_when_condition_holds() {
        crate::debug_assert_or_log!(2 + 2 == 4, "should not panic");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "assertion failed: 1 == 2")]
    fn debug_assert_or_log_panics_with_default_message_when_condition_fails() {
        crate::debug_assert_or_log!(1 == 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "custom invariant message")]
    fn debug_assert_or_log_panics_with_custom_message_when_condition_fails() {
        crate::debug_assert_or_log!(false, "custom invariant message");
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn no_panic_without_debug_assertions() {
        crate::debug_assert_or_log!(false, "should not panic");
    }
}
