//! Session logger: one log file per process in the OS data directory.
//!
//! The file is **truncated at each launch**, so it only holds the most recent
//! session. A long-running `serve` keeps one log; the next start begins fresh.
//!
//! Log location:
//!   Windows:  `%APPDATA%\fftblur\fftblur.log`
//!   Linux:    `~/.local/share/fftblur/fftblur.log`
//!   macOS:    `~/Library/Application Support/fftblur/fftblur.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the crate.
//! Before `init()` (e.g. in tests) lines go nowhere unless echo is enabled.
//!
//! Panics inside dispatcher units are caught and turned into errors, so the
//! panic hook is the only place their location survives. Units run under
//! [`in_unit`], which tags the thread with the unit index; the hook writes
//! that tag next to the thread name.

use std::any::Any;
use std::cell::Cell;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

struct Session {
    path: PathBuf,
    file: Mutex<File>,
}

static SESSION: OnceLock<Session> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

thread_local! {
    static UNIT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Path of the current session log, once `init` has succeeded.
pub fn log_path() -> Option<&'static Path> {
    SESSION.get().map(|s| s.path.as_path())
}

/// Mirror every log line to stderr as well (the CLI's `--verbose`).
pub fn set_echo(enabled: bool) {
    ECHO.store(enabled, Ordering::Relaxed);
}

/// Write a raw line. I/O errors are swallowed; logging never fails a job.
pub fn write_line(line: &str) {
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Some(session) = SESSION.get()
        && let Ok(mut file) = session.file.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Write a timestamped, level-tagged line.
pub fn write(level: &str, msg: &str) {
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Run `f` tagged as dispatch unit `index`. The previous tag is restored on
/// return and while unwinding.
pub fn in_unit<R>(index: usize, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<usize>);
    impl Drop for Restore {
        fn drop(&mut self) {
            UNIT.with(|u| u.set(self.0));
        }
    }
    let _restore = Restore(UNIT.with(|u| u.replace(Some(index))));
    f()
}

/// Unit index the current thread is running, if any.
pub fn current_unit() -> Option<usize> {
    UNIT.with(Cell::get)
}

/// Text of a panic payload (`panic!` with a literal or a formatted message).
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn describe_panic(thread: &str, unit: Option<usize>, location: Option<String>, message: &str) -> String {
    let mut line = format!("thread '{}'", thread);
    if let Some(i) = unit {
        line.push_str(&format!(" unit {}", i));
    }
    if let Some(loc) = location {
        line.push_str(&format!(" at {}", loc));
    }
    line.push_str(": ");
    line.push_str(message);
    line
}

/// Open the session log at the default location.
pub fn init() {
    init_at(&data_dir().join("fftblur").join("fftblur.log"));
}

/// Open (truncate) the session log at `path` and install the panic hook.
/// Only the first successful call takes effect.
pub fn init_at(path: &Path) {
    if SESSION.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let session = Session {
        path: path.to_path_buf(),
        file: Mutex::new(file),
    };
    if SESSION.set(session).is_err() {
        return;
    }

    write_line(&format!(
        "=== fftblur {} session, {}, pid {} ===",
        env!("CARGO_PKG_VERSION"),
        unix_time(),
        std::process::id()
    ));
    write_line(&format!("log file: {}", path.display()));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line()));
        write(
            "PANIC",
            &describe_panic(
                thread.name().unwrap_or("unnamed"),
                current_unit(),
                location,
                &panic_message(info.payload()),
            ),
        );
        prev(info);
    }));
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// `HH:MM:SS.mmm` (UTC) within the current day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format_clock(d.as_millis() as u64),
        Err(_) => "??:??:??.???".to_string(),
    }
}

fn format_clock(millis: u64) -> String {
    let secs = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        millis % 1000
    )
}

fn unix_time() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("unix time {}", d.as_secs()),
        Err(_) => "unknown time".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00:00.000");
        assert_eq!(format_clock((86400 + 3661) * 1000 + 42), "01:01:01.042");
        assert_eq!(format_clock(86399 * 1000 + 999), "23:59:59.999");
    }

    #[test]
    fn panic_description_names_thread_and_unit() {
        assert_eq!(
            describe_panic("fftblur-worker-2", Some(7), Some("src/a.rs:10".into()), "boom"),
            "thread 'fftblur-worker-2' unit 7 at src/a.rs:10: boom"
        );
        assert_eq!(describe_panic("main", None, None, "x"), "thread 'main': x");
    }

    #[test]
    fn unit_tag_is_scoped() {
        assert_eq!(current_unit(), None);
        in_unit(3, || {
            assert_eq!(current_unit(), Some(3));
            in_unit(5, || assert_eq!(current_unit(), Some(5)));
            assert_eq!(current_unit(), Some(3));
        });
        assert_eq!(current_unit(), None);
    }

    #[test]
    fn unit_tag_restored_after_panic() {
        fn explode() -> usize {
            panic!("unit failed")
        }
        let caught = panic::catch_unwind(AssertUnwindSafe(|| in_unit(9, explode)));
        let payload = caught.unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "unit failed");
        assert_eq!(current_unit(), None);
    }

    #[test]
    fn writing_before_init_is_harmless() {
        log_info!("no log file yet: {}", 42);
        write("WARN", "still fine");
    }
}
