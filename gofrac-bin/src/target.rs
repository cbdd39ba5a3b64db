use gofra::codegen::{self, Target};

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum Architecture {
    Aarch64,
    X86_64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum OperatingSystem {
    Darwin,
    Linux,
    Windows,
}

impl From<Architecture> for codegen::Architecture {
    fn from(value: Architecture) -> Self {
        match value {
            Architecture::Aarch64 => codegen::Architecture::Aarch64,
            Architecture::X86_64 => codegen::Architecture::X86_64,
        }
    }
}

impl From<OperatingSystem> for codegen::OperatingSystem {
    fn from(value: OperatingSystem) -> Self {
        match value {
            OperatingSystem::Darwin => codegen::OperatingSystem::Darwin,
            OperatingSystem::Linux => codegen::OperatingSystem::Linux,
            OperatingSystem::Windows => codegen::OperatingSystem::Windows,
        }
    }
}

/// Combines the requested values with the host defaults.
pub fn resolve(architecture: Option<Architecture>, os: Option<OperatingSystem>) -> Target {
    Target::new(
        architecture.unwrap_or(DEFAULT_ARCHITECTURE).into(),
        os.unwrap_or(DEFAULT_OPERATING_SYSTEM).into(),
    )
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        pub const DEFAULT_ARCHITECTURE: Architecture = Architecture::Aarch64;
    } else {
        pub const DEFAULT_ARCHITECTURE: Architecture = Architecture::X86_64;
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        pub const DEFAULT_OPERATING_SYSTEM: OperatingSystem = OperatingSystem::Darwin;
    } else if #[cfg(target_os = "windows")] {
        pub const DEFAULT_OPERATING_SYSTEM: OperatingSystem = OperatingSystem::Windows;
    } else {
        pub const DEFAULT_OPERATING_SYSTEM: OperatingSystem = OperatingSystem::Linux;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_explicit_values_win() {
        let target = resolve(Some(Architecture::X86_64), Some(OperatingSystem::Linux));
        assert_eq!(target, Target::X86_64_LINUX);
        assert_eq!(target.to_string(), "x86_64-linux");
    }
}
