use std::fs::OpenOptions;

/// Open flags that only exist on some platforms.
pub(crate) trait OpenOptionsExt {
    /// Requests `O_SYNC`: every write returns only once it reached the device.
    fn sync_writes(&mut self, enabled: bool) -> &mut Self;
}

impl OpenOptionsExt for OpenOptions {
    #[cfg(unix)]
    fn sync_writes(&mut self, enabled: bool) -> &mut Self {
        use std::os::unix::fs::OpenOptionsExt as _;

        if enabled {
            self.custom_flags(libc::O_SYNC);
        }
        self
    }

    #[cfg(not(unix))]
    fn sync_writes(&mut self, _enabled: bool) -> &mut Self {
        // FILE_FLAG_WRITE_THROUGH needs `CreateFileW`, which `OpenOptions`
        // does not expose. The explicit sync before success still applies.
        self
    }
}
