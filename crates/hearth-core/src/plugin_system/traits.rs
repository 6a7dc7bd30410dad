use std::ffi::{c_char, c_void};
use std::fmt;

/// Error type for plugin lifecycle hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    EnableError(String),
    DisableError(String),
    ExecutionError(String),
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginError::EnableError(msg) => write!(f, "Plugin enable error: {}", msg),
            PluginError::DisableError(msg) => write!(f, "Plugin disable error: {}", msg),
            PluginError::ExecutionError(msg) => write!(f, "Plugin execution error: {}", msg),
        }
    }
}

impl std::error::Error for PluginError {}

/// Core trait that every entry-point instance implements
pub trait Plugin: Send + Sync {
    /// The name of the plugin
    fn name(&self) -> &str;

    /// Called once after activation, and again whenever an administrator re-enables the plugin
    fn enable(&self) -> Result<(), PluginError>;

    /// Called when an administrator disables the plugin and on host shutdown
    fn disable(&self) -> Result<(), PluginError>;
}

// --- Native ABI ---

/// Status codes returned across the FFI boundary
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Ok = 0,
    Err = 1,
    NullPointer = 2,
    Utf8Error = 3,
    Panic = 4,
}

/// Function table a native package hands to the host.
///
/// The host owns the returned allocation: it calls `destroy(instance)` and then
/// frees the table with `Box::from_raw`, so the entry symbol must allocate it
/// with `Box::into_raw`.
#[repr(C)]
pub struct PluginVTable {
    pub instance: *mut c_void,
    pub name: extern "C" fn(instance: *const c_void) -> *const c_char,
    pub free_name: extern "C" fn(name: *mut c_char),
    pub enable: extern "C" fn(instance: *mut c_void) -> FfiResult,
    pub disable: extern "C" fn(instance: *mut c_void) -> FfiResult,
    pub destroy: extern "C" fn(instance: *mut c_void),
}

/// Signature of the symbol named by a package's `Entry-Point` attribute
pub type PluginEntryFn = unsafe extern "C-unwind" fn() -> *mut PluginVTable;

/// Export a [`Plugin`] implementation from a `cdylib` under the given entry symbol.
///
/// ```ignore
/// hearth_core::export_plugin!(greeter_entry, Greeter, Greeter::new());
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($symbol:ident, $plugin_type:ty, $constructor:expr) => {
        extern "C" fn __hearth_plugin_name(instance: *const ::std::ffi::c_void) -> *const ::std::ffi::c_char {
            let plugin = unsafe { &*(instance as *const $plugin_type) };
            match ::std::ffi::CString::new(<$plugin_type as $crate::plugin_system::Plugin>::name(plugin)) {
                Ok(name) => name.into_raw(),
                Err(_) => ::std::ptr::null(),
            }
        }

        extern "C" fn __hearth_plugin_free_name(name: *mut ::std::ffi::c_char) {
            if !name.is_null() {
                unsafe {
                    let _ = ::std::ffi::CString::from_raw(name);
                }
            }
        }

        fn __hearth_plugin_call(
            instance: *mut ::std::ffi::c_void,
            hook: fn(&$plugin_type) -> ::std::result::Result<(), $crate::plugin_system::PluginError>,
        ) -> $crate::plugin_system::FfiResult {
            if instance.is_null() {
                return $crate::plugin_system::FfiResult::NullPointer;
            }
            let plugin = unsafe { &*(instance as *const $plugin_type) };
            match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| hook(plugin))) {
                Ok(Ok(())) => $crate::plugin_system::FfiResult::Ok,
                Ok(Err(_)) => $crate::plugin_system::FfiResult::Err,
                Err(_) => $crate::plugin_system::FfiResult::Panic,
            }
        }

        extern "C" fn __hearth_plugin_enable(instance: *mut ::std::ffi::c_void) -> $crate::plugin_system::FfiResult {
            __hearth_plugin_call(instance, <$plugin_type as $crate::plugin_system::Plugin>::enable)
        }

        extern "C" fn __hearth_plugin_disable(instance: *mut ::std::ffi::c_void) -> $crate::plugin_system::FfiResult {
            __hearth_plugin_call(instance, <$plugin_type as $crate::plugin_system::Plugin>::disable)
        }

        extern "C" fn __hearth_plugin_destroy(instance: *mut ::std::ffi::c_void) {
            if instance.is_null() {
                return;
            }
            let _ = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| unsafe {
                drop(Box::from_raw(instance as *mut $plugin_type));
            }));
        }

        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn $symbol() -> *mut $crate::plugin_system::PluginVTable {
            let constructed = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| -> $plugin_type { $constructor }));
            match constructed {
                Ok(plugin) => {
                    let instance = Box::into_raw(Box::new(plugin)) as *mut ::std::ffi::c_void;
                    Box::into_raw(Box::new($crate::plugin_system::PluginVTable {
                        instance,
                        name: __hearth_plugin_name,
                        free_name: __hearth_plugin_free_name,
                        enable: __hearth_plugin_enable,
                        disable: __hearth_plugin_disable,
                        destroy: __hearth_plugin_destroy,
                    }))
                }
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
}
