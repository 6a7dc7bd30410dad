use std::ffi::{CStr, c_char, c_void};
use std::panic;
use std::path::Path;

use libloading::{Library, Symbol};

use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::entry_point::EntryPointResolver;
use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};
use crate::plugin_system::manifest::ComponentManifest;
use crate::plugin_system::traits::{FfiResult, Plugin, PluginEntryFn, PluginError, PluginVTable};
use crate::utils::panic_message;

/// Resolves entry points by loading the package's native library out of its
/// archive and calling the exported entry symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEntryPoints;

impl NativeEntryPoints {
    pub fn new() -> Self {
        Self
    }
}

impl EntryPointResolver for NativeEntryPoints {
    fn instantiate(
        &self,
        context: &mut CodeLoadingContext,
        manifest: &ComponentManifest,
        entry_point: &str,
    ) -> Result<Box<dyn Plugin>, PluginSystemError> {
        let library_entry = native_library_entry(context, manifest, entry_point)?;
        let lib_path = context.extract(&library_entry)?;
        let plugin = load_entry_point(context.package(), &lib_path, entry_point)?;
        Ok(Box::new(plugin))
    }
}

/// Pick the library entry named by `Native-Library`, or the only entry carrying
/// the platform's dynamic-library extension.
fn native_library_entry(
    context: &CodeLoadingContext,
    manifest: &ComponentManifest,
    entry_point: &str,
) -> Result<String, PluginSystemError> {
    if let Some(declared) = manifest.native_library() {
        return Ok(declared.to_string());
    }
    let suffix = format!(".{}", std::env::consts::DLL_EXTENSION);
    let mut candidates: Vec<String> = context
        .resource_names()
        .into_iter()
        .filter(|name| name.to_lowercase().ends_with(&suffix))
        .collect();
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(PluginSystemError::EntryPointError {
            plugin_id: context.package().to_string(),
            entry_point: entry_point.to_string(),
            message: format!("package contains no '{}' library", suffix),
        }),
        _ => Err(PluginSystemError::EntryPointError {
            plugin_id: context.package().to_string(),
            entry_point: entry_point.to_string(),
            message: format!("ambiguous native library, set Native-Library to one of {:?}", candidates),
        }),
    }
}

fn load_entry_point(package: &str, lib_path: &Path, entry_point: &str) -> Result<VTablePluginWrapper, PluginSystemError> {
    let library = unsafe { Library::new(lib_path) }.map_err(|e| PluginSystemError::LoadingError {
        plugin_id: package.to_string(),
        path: Some(lib_path.to_path_buf()),
        source: Box::new(PluginSystemErrorSource::Library(e)),
    })?;

    let mut symbol_name = entry_point.as_bytes().to_vec();
    symbol_name.push(0);
    let entry_fn: PluginEntryFn = {
        let symbol: Symbol<PluginEntryFn> =
            unsafe { library.get(&symbol_name) }.map_err(|e| PluginSystemError::EntryPointError {
                plugin_id: package.to_string(),
                entry_point: entry_point.to_string(),
                message: format!("missing symbol: {}", e),
            })?;
        *symbol
    };

    let vtable_ptr = match panic::catch_unwind(|| unsafe { entry_fn() }) {
        Ok(ptr) if !ptr.is_null() => ptr,
        Ok(_) => {
            return Err(PluginSystemError::EntryPointError {
                plugin_id: package.to_string(),
                entry_point: entry_point.to_string(),
                message: "entry point returned a null vtable".to_string(),
            });
        }
        Err(panic_obj) => {
            return Err(PluginSystemError::FfiError {
                plugin_id: package.to_string(),
                operation: entry_point.to_string(),
                message: format!("panic: {}", panic_message(panic_obj.as_ref())),
            });
        }
    };

    unsafe { VTablePluginWrapper::new(vtable_ptr, library, package) }
}

/// Maps FfiResult to PluginError
fn map_ffi_error(ffi_err: FfiResult, operation: &str) -> PluginError {
    let message = format!("FFI call returned {:?}", ffi_err);
    match operation {
        "enable" => PluginError::EnableError(message),
        "disable" => PluginError::DisableError(message),
        _ => PluginError::ExecutionError(message),
    }
}

/// Safely converts an FFI C string pointer to a Rust String.
/// # Safety
/// The caller must ensure that `ptr` is a valid pointer to a null-terminated
/// C string, and that it remains valid for the duration of this function call.
unsafe fn ffi_string_from_ptr(ptr: *const c_char) -> Result<String, FfiResult> {
    if ptr.is_null() {
        return Err(FfiResult::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_owned())
        .map_err(|_| FfiResult::Utf8Error)
}

#[derive(Debug, Clone, Copy)]
struct UnsafeVTablePtr(*mut PluginVTable);
unsafe impl Send for UnsafeVTablePtr {}
unsafe impl Sync for UnsafeVTablePtr {}

/// Host-side view of a native plugin instance. Owns the vtable allocation and
/// the library it came from; both are released on drop, library last.
#[derive(Debug)]
struct VTablePluginWrapper {
    vtable: UnsafeVTablePtr,
    library: Option<Library>,
    name_cache: String,
}

impl VTablePluginWrapper {
    /// # Safety
    /// `vtable_ptr` must be a non-null table produced by an entry symbol of `library`.
    unsafe fn new(vtable_ptr: *mut PluginVTable, library: Library, package: &str) -> Result<Self, PluginSystemError> {
        let vtable_ref = unsafe { &*vtable_ptr };
        let instance_const = vtable_ref.instance as *const c_void;

        let name_ptr = (vtable_ref.name)(instance_const);
        let name = unsafe { ffi_string_from_ptr(name_ptr) };
        if !name_ptr.is_null() {
            (vtable_ref.free_name)(name_ptr as *mut c_char);
        }

        let mut wrapper = Self {
            vtable: UnsafeVTablePtr(vtable_ptr),
            library: Some(library),
            name_cache: String::new(),
        };
        match name {
            Ok(name) => {
                wrapper.name_cache = name;
                Ok(wrapper)
            }
            // wrapper drops here, destroying the instance
            Err(e) => Err(PluginSystemError::FfiError {
                plugin_id: package.to_string(),
                operation: "name".to_string(),
                message: format!("{:?}", e),
            }),
        }
    }

    fn call_hook(&self, operation: &str, hook: extern "C" fn(*mut c_void) -> FfiResult) -> Result<(), PluginError> {
        let vtable_ptr = self.vtable.0;
        let result = panic::catch_unwind(panic::AssertUnwindSafe(move || unsafe {
            let vtable = &*vtable_ptr;
            hook(vtable.instance)
        }));
        match result {
            Ok(FfiResult::Ok) => Ok(()),
            Ok(ffi_res) => Err(map_ffi_error(ffi_res, operation)),
            Err(panic_obj) => Err(PluginError::ExecutionError(format!(
                "panic in '{}' during {}: {}",
                self.name_cache,
                operation,
                panic_message(panic_obj.as_ref())
            ))),
        }
    }
}

impl Drop for VTablePluginWrapper {
    fn drop(&mut self) {
        unsafe {
            if !self.vtable.0.is_null() {
                let vtable_ref = &*self.vtable.0;
                (vtable_ref.destroy)(vtable_ref.instance);
                let _vtable_box = Box::from_raw(self.vtable.0);
                self.vtable.0 = std::ptr::null_mut();
            }
        }
        drop(self.library.take());
    }
}

impl Plugin for VTablePluginWrapper {
    fn name(&self) -> &str {
        &self.name_cache
    }

    fn enable(&self) -> Result<(), PluginError> {
        let hook = unsafe { (*self.vtable.0).enable };
        self.call_hook("enable", hook)
    }

    fn disable(&self) -> Result<(), PluginError> {
        let hook = unsafe { (*self.vtable.0).disable };
        self.call_hook("disable", hook)
    }
}
