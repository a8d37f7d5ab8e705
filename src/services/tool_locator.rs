use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::ffi::OsStr;

/// Name of the external tool as looked up on `PATH`.
pub const TOOL_NAME: &str = "cleanmodels-cli";

/// File name of the external tool on this platform.
pub const TOOL_BINARY_NAME: &str = if cfg!(windows) {
    "cleanmodels-cli.exe"
} else {
    "cleanmodels-cli"
};

/// Find the tool: explicit override, then `PATH`, the working directory and
/// the directory of the running executable.
pub fn locate_tool(override_path: Option<&Utf8Path>, work_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let path_var = env::var_os("PATH");
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| Utf8PathBuf::try_from(exe).ok())
        .and_then(|exe| exe.parent().map(Utf8Path::to_path_buf));

    locate_in(
        override_path,
        path_var.as_deref(),
        work_dir,
        exe_dir.as_deref(),
    )
}

/// Search with every location passed in explicitly.
pub fn locate_in(
    override_path: Option<&Utf8Path>,
    path_var: Option<&OsStr>,
    work_dir: &Utf8Path,
    exe_dir: Option<&Utf8Path>,
) -> Option<Utf8PathBuf> {
    if let Some(path) = override_path {
        match which::which_in(path, None::<&OsStr>, work_dir) {
            Ok(found) => return to_utf8(found),
            Err(e) => tracing::warn!("Configured tool path {} is not usable: {}", path, e),
        }
    }

    if let Some(found) = path_var.and_then(|paths| search(Some(paths), work_dir)) {
        return Some(found);
    }

    std::iter::once(work_dir)
        .chain(exe_dir)
        .find_map(|dir| search(Some(dir.as_os_str()), work_dir))
}

fn search(paths: Option<&OsStr>, cwd: &Utf8Path) -> Option<Utf8PathBuf> {
    which::which_in(TOOL_NAME, paths, cwd).ok().and_then(to_utf8)
}

fn to_utf8(path: std::path::PathBuf) -> Option<Utf8PathBuf> {
    match Utf8PathBuf::try_from(path) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("Ignoring non UTF-8 tool path {}", e.as_path().display());
            None
        }
    }
}
