use std::{path::PathBuf, sync::LazyLock};

pub static DEFAULT_DATA_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Some(dir) = std::env::var_os("CTUP_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let mut path = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_default();
    path.push("ctup");
    path
});

/// Home directory used for resolving launcher install locations.
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

/// Computes a path inside the ctup data directory.
///
/// Returns a `&Path` referencing the data directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the base data directory if at least
/// one argument is passed in.
///
/// # Examples
///
/// ```
/// // Without `CTUP_DATA_DIR` the data directory is $XDG_DATA_HOME/ctup
/// let logs = ctup::ctup_path!("logs");
/// assert!(logs.ends_with("logs"));
/// ```
#[macro_export]
macro_rules! ctup_path {
    () => {
        $crate::paths::DEFAULT_DATA_PATH.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_DATA_PATH.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}
