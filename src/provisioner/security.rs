//! Container security profiles.
//!
//! Three named hardening bundles control capabilities, seccomp, privilege
//! escalation, root filesystem mutability, user-namespace remapping, pid
//! caps, and mandatory-access-control labels. Every profile emits at least
//! the baseline set (no-new-privileges, read-only rootfs, a pids cap); the
//! legacy `isolate` switch maps to the minimal profile. Profiles are plain
//! values handed to the provisioner.

use serde::Serialize;

/// Security isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Baseline hardening only.
    Minimal,
    /// Balanced default: dropped capabilities plus seccomp.
    Standard,
    /// Maximum isolation: tight capabilities, seccomp, userns remap.
    Strict,
}

impl SecurityLevel {
    /// Lowercase profile name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Strict => "strict",
        }
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(Self::Minimal),
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            other => Err(format!("Unknown security profile: {other}")),
        }
    }
}

/// Capabilities added back by the standard profile after dropping ALL.
const STANDARD_CAP_ADD: &[&str] = &[
    "CHOWN",
    "DAC_OVERRIDE",
    "FOWNER",
    "FSETID",
    "KILL",
    "SETGID",
    "SETUID",
    "SETPCAP",
    "NET_BIND_SERVICE",
    "NET_RAW",
    "SYS_CHROOT",
    "AUDIT_WRITE",
];

/// The only capabilities the strict profile keeps.
const STRICT_CAP_ADD: &[&str] = &["CHOWN", "SETUID", "SETGID", "NET_BIND_SERVICE"];

/// Container security configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityProfile {
    /// Profile name.
    pub name: String,
    /// Isolation level the profile was built from.
    pub level: SecurityLevel,
    /// Seccomp profile name passed to the runtime.
    pub seccomp_profile: Option<String>,
    /// Capabilities to drop.
    pub cap_drop: Vec<String>,
    /// Capabilities to add back.
    pub cap_add: Vec<String>,
    /// User-namespace remap spec (`user:group`).
    pub userns_remap: Option<String>,
    /// Disallow privilege escalation.
    pub no_new_privileges: bool,
    /// Mount the root filesystem read-only.
    pub read_only_rootfs: bool,
    /// AppArmor profile name.
    pub apparmor_profile: Option<String>,
    /// SELinux label.
    pub selinux_label: Option<String>,
    /// Max process count.
    pub pids_limit: Option<u32>,
}

impl SecurityProfile {
    /// Builds one of the three named profiles.
    #[must_use]
    pub fn builtin(level: SecurityLevel) -> Self {
        let base = Self {
            name: level.as_str().to_string(),
            level,
            seccomp_profile: None,
            cap_drop: Vec::new(),
            cap_add: Vec::new(),
            userns_remap: None,
            no_new_privileges: true,
            read_only_rootfs: true,
            apparmor_profile: None,
            selinux_label: None,
            pids_limit: Some(256),
        };

        match level {
            SecurityLevel::Minimal => base,
            SecurityLevel::Standard => Self {
                seccomp_profile: Some("standard".to_string()),
                cap_drop: vec!["ALL".to_string()],
                cap_add: STANDARD_CAP_ADD.iter().map(ToString::to_string).collect(),
                pids_limit: Some(512),
                ..base
            },
            SecurityLevel::Strict => Self {
                seccomp_profile: Some("strict".to_string()),
                cap_drop: vec!["ALL".to_string()],
                cap_add: STRICT_CAP_ADD.iter().map(ToString::to_string).collect(),
                userns_remap: Some("dockremap:dockremap".to_string()),
                ..base
            },
        }
    }

    /// Resolves a profile by name.
    ///
    /// # Errors
    ///
    /// Returns the unknown name.
    pub fn by_name(name: &str) -> Result<Self, String> {
        name.parse::<SecurityLevel>().map(Self::builtin)
    }

    /// Renders the profile as container-run flag fragments.
    #[must_use]
    pub fn to_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();

        if let Some(seccomp) = &self.seccomp_profile {
            flags.push("--security-opt".to_string());
            flags.push(format!("seccomp={seccomp}"));
        }

        for cap in &self.cap_drop {
            flags.push("--cap-drop".to_string());
            flags.push(cap.clone());
        }
        for cap in &self.cap_add {
            flags.push("--cap-add".to_string());
            flags.push(cap.clone());
        }

        if let Some(remap) = &self.userns_remap {
            flags.push("--userns".to_string());
            flags.push(format!("remap:{remap}"));
        }

        if self.no_new_privileges {
            flags.push("--security-opt".to_string());
            flags.push("no-new-privileges:true".to_string());
        }

        if self.read_only_rootfs {
            flags.push("--read-only".to_string());
        }

        if let Some(apparmor) = &self.apparmor_profile {
            flags.push("--security-opt".to_string());
            flags.push(format!("apparmor={apparmor}"));
        }

        if let Some(label) = &self.selinux_label {
            flags.push("--security-opt".to_string());
            flags.push(format!("label={label}"));
        }

        if let Some(pids) = self.pids_limit {
            flags.push("--pids-limit".to_string());
            flags.push(pids.to_string());
        }

        flags
    }
}

// ============================================================================
// Tests
// ============================================================================
