// src/user.rs

//! Identity of the user running dockhand, for containers with
//! run-as-current-user enabled.

/// Host user and group that run-as-current-user containers run as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub uid: u32,
    pub gid: u32,
    pub user_name: String,
    pub group_name: String,
}

impl CurrentUser {
    pub fn new(
        uid: u32,
        gid: u32,
        user_name: impl Into<String>,
        group_name: impl Into<String>,
    ) -> Self {
        Self {
            uid,
            gid,
            user_name: user_name.into(),
            group_name: group_name.into(),
        }
    }

    /// Look up the current process's user and group.
    #[cfg(unix)]
    pub fn detect() -> Self {
        // SAFETY: getuid/getgid cannot fail and have no preconditions.
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        let user_name = user_name_for(uid)
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| format!("user{uid}"));
        let group_name = group_name_for(gid).unwrap_or_else(|| format!("group{gid}"));

        Self::new(uid, gid, user_name, group_name)
    }

    /// Containers on non-Unix hosts run as root.
    #[cfg(not(unix))]
    pub fn detect() -> Self {
        Self::new(0, 0, "root", "root")
    }

    /// `uid:gid`, as passed to `--user`.
    pub fn user_and_group(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }

    /// Contents of the `/etc/passwd` mounted into the container.
    pub fn passwd_file(&self, home_directory: &str) -> String {
        if self.uid == 0 {
            format!("root:x:0:0:root:{home_directory}:/bin/sh\n")
        } else {
            format!(
                "root:x:0:0:root:/root:/bin/sh\n{name}:x:{uid}:{gid}:{name}:{home_directory}:/bin/sh\n",
                name = self.user_name,
                uid = self.uid,
                gid = self.gid,
            )
        }
    }

    /// Contents of the `/etc/group` mounted into the container.
    pub fn group_file(&self) -> String {
        if self.gid == 0 {
            "root:x:0:root\n".to_string()
        } else {
            format!(
                "root:x:0:root\n{}:x:{}:{}\n",
                self.group_name, self.gid, self.user_name
            )
        }
    }
}

#[cfg(unix)]
fn user_name_for(uid: libc::uid_t) -> Option<String> {
    // SAFETY: getpwuid returns either null or a pointer to a static entry
    // that stays valid until the next getpw* call; we copy out of it
    // immediately.
    unsafe {
        let entry = libc::getpwuid(uid);
        if entry.is_null() || (*entry).pw_name.is_null() {
            return None;
        }
        Some(
            std::ffi::CStr::from_ptr((*entry).pw_name)
                .to_string_lossy()
                .into_owned(),
        )
    }
}

#[cfg(unix)]
fn group_name_for(gid: libc::gid_t) -> Option<String> {
    // SAFETY: as for getpwuid above.
    unsafe {
        let entry = libc::getgrgid(gid);
        if entry.is_null() || (*entry).gr_name.is_null() {
            return None;
        }
        Some(
            std::ffi::CStr::from_ptr((*entry).gr_name)
                .to_string_lossy()
                .into_owned(),
        )
    }
}
