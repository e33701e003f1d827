use std::io::Write;

/// Print the error chain and take the whole process group down.
///
/// Peers blocked at a barrier would otherwise wait forever for this seat.
/// With `kill_group` unset the process only exits, which keeps test
/// harnesses sharing the group alive.
pub fn abort_group(err: &anyhow::Error, kill_group: bool) -> ! {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "shm-bridge [{}]: {err:#}", std::process::id());
    let _ = stderr.flush();
    drop(stderr);

    if kill_group {
        // SAFETY: kill has no memory-safety preconditions; pid 0 addresses
        // the caller's own process group.
        unsafe {
            libc::kill(0, libc::SIGKILL);
        }
    }
    std::process::exit(1)
}
