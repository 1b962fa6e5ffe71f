//! Platform/architecture selection and expansion.
//!
//! Turns the user's platform and arch selectors into the list of concrete
//! [`Target`]s to build, using the table of official Electron releases.

use crate::bundler::error::{Error, Result};
use crate::output::OutputManager;
use semver::Version;
use std::fmt;
use std::sync::Arc;

const MAC_ARCHS: &[Arch] = &[Arch::X64, Arch::Arm64, Arch::Universal];
const LINUX_ARCHS: &[Arch] = &[
    Arch::Ia32,
    Arch::X64,
    Arch::Armv7l,
    Arch::Arm64,
    Arch::Mips64el,
];
const WIN32_ARCHS: &[Arch] = &[Arch::Ia32, Arch::X64, Arch::Arm64];

/// Operating system family of a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    /// macOS (Developer ID distribution)
    Darwin,
    /// Mac App Store
    Mas,
    /// Linux
    Linux,
    /// Windows
    Win32,
    /// Anything else; only reachable with a custom download mirror.
    Other(String),
}

/// CPU architecture of a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    /// 32-bit x86
    Ia32,
    /// 64-bit x86
    X64,
    /// 32-bit ARM
    Armv7l,
    /// 64-bit ARM
    Arm64,
    /// 64-bit little-endian MIPS
    Mips64el,
    /// x64 and arm64 merged into one macOS bundle
    Universal,
    /// Anything else; only reachable with a custom download mirror.
    Other(String),
}

impl Platform {
    /// Every official platform, in table order.
    pub const OFFICIAL: &'static [Platform] =
        &[Platform::Darwin, Platform::Linux, Platform::Mas, Platform::Win32];

    /// Upstream identifier (`darwin`, `win32`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Darwin => "darwin",
            Platform::Mas => "mas",
            Platform::Linux => "linux",
            Platform::Win32 => "win32",
            Platform::Other(s) => s,
        }
    }

    /// Parses an identifier; unknown values become [`Platform::Other`].
    pub fn parse(value: &str) -> Self {
        match value {
            "darwin" => Platform::Darwin,
            "mas" => Platform::Mas,
            "linux" => Platform::Linux,
            "win32" => Platform::Win32,
            other => Platform::Other(other.to_string()),
        }
    }

    /// Platform of the machine running the packager.
    pub fn host() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::Darwin,
            "windows" => Platform::Win32,
            other => Platform::parse(other),
        }
    }

    /// darwin and mas share the `.app` bundle layout.
    pub fn is_mac_family(&self) -> bool {
        matches!(self, Platform::Darwin | Platform::Mas)
    }

    /// Architectures Electron publishes for this platform.
    pub fn official_archs(&self) -> &'static [Arch] {
        match self {
            Platform::Darwin | Platform::Mas => MAC_ARCHS,
            Platform::Linux => LINUX_ARCHS,
            Platform::Win32 => WIN32_ARCHS,
            Platform::Other(_) => &[],
        }
    }
}

impl Arch {
    /// Every official architecture.
    pub const OFFICIAL: &'static [Arch] = &[
        Arch::Ia32,
        Arch::X64,
        Arch::Armv7l,
        Arch::Arm64,
        Arch::Mips64el,
        Arch::Universal,
    ];

    /// Upstream identifier (`x64`, `arm64`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            Arch::Ia32 => "ia32",
            Arch::X64 => "x64",
            Arch::Armv7l => "armv7l",
            Arch::Arm64 => "arm64",
            Arch::Mips64el => "mips64el",
            Arch::Universal => "universal",
            Arch::Other(s) => s,
        }
    }

    /// Parses an identifier; unknown values become [`Arch::Other`].
    pub fn parse(value: &str) -> Self {
        match value {
            "ia32" => Arch::Ia32,
            "x64" => Arch::X64,
            "armv7l" => Arch::Armv7l,
            "arm64" => Arch::Arm64,
            "mips64el" => Arch::Mips64el,
            "universal" => Arch::Universal,
            other => Arch::Other(other.to_string()),
        }
    }

    /// Architecture of the machine running the packager.
    pub fn host() -> Self {
        match std::env::consts::ARCH {
            "x86_64" => Arch::X64,
            "x86" => Arch::Ia32,
            "aarch64" => Arch::Arm64,
            "arm" => Arch::Armv7l,
            "mips64" => Arch::Mips64el,
            other => Arch::parse(other),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete (platform, arch) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    /// Target platform
    pub platform: Platform,
    /// Target architecture
    pub arch: Arch,
}

impl Target {
    /// Creates a target from its parts.
    pub fn new(platform: Platform, arch: Arch) -> Self {
        Self { platform, arch }
    }

    /// The synthetic universal macOS target is built from two slices.
    pub fn is_universal_mac(&self) -> bool {
        self.platform.is_mac_family() && self.arch == Arch::Universal
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.platform, self.arch)
    }
}

/// A platform or arch selector as written by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Every official value
    All,
    /// Explicit values
    Values(Vec<String>),
}

impl Selector {
    /// Parses `all` or a comma separated list (`darwin, linux`).
    pub fn parse(value: &str) -> Self {
        if value.trim() == "all" {
            return Selector::All;
        }
        Selector::Values(
            value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// Builds a selector from a list; a lone `all` means every value.
    pub fn from_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.len() == 1 && values[0] == "all" {
            Selector::All
        } else {
            Selector::Values(values)
        }
    }

    fn is_all(selector: Option<&Selector>) -> bool {
        matches!(selector, Some(Selector::All))
    }
}

/// Caller-supplied predicate; returning `true` drops the target.
pub type TargetFilter = Arc<dyn Fn(&Target) -> bool + Send + Sync>;

/// What to expand, as seen by [`expand_targets`].
pub struct TargetRequest<'a> {
    /// Platform selector; `None` means the host platform
    pub platform: Option<&'a Selector>,
    /// Arch selector; `None` means the host arch
    pub arch: Option<&'a Selector>,
    /// `--all`: every official platform and arch
    pub all: bool,
    /// Official constraints apply only without a custom mirror
    pub official: bool,
}

impl TargetRequest<'_> {
    fn all_requested(&self) -> bool {
        self.all || (Selector::is_all(self.platform) && Selector::is_all(self.arch))
    }
}

/// Resolves the platform selector to validated platforms.
pub fn resolve_platforms(request: &TargetRequest<'_>) -> Result<Vec<Platform>> {
    let values = resolve_values(
        request.platform,
        request.all,
        Platform::OFFICIAL,
        Platform::host,
        Platform::parse,
    );
    validate(values, request.official, Platform::OFFICIAL, |value| {
        Error::InvalidPlatform {
            supported: join(Platform::OFFICIAL),
            value,
        }
    })
}

/// Resolves the arch selector to validated architectures.
pub fn resolve_archs(request: &TargetRequest<'_>) -> Result<Vec<Arch>> {
    let values = resolve_values(
        request.arch,
        request.all,
        Arch::OFFICIAL,
        Arch::host,
        Arch::parse,
    );
    validate(values, request.official, Arch::OFFICIAL, |value| {
        Error::InvalidArch {
            supported: join(Arch::OFFICIAL),
            value,
        }
    })
}

fn resolve_values<T: Clone>(
    selector: Option<&Selector>,
    all: bool,
    official: &[T],
    host: fn() -> T,
    parse: fn(&str) -> T,
) -> Vec<T> {
    if all {
        return official.to_vec();
    }
    match selector {
        None => vec![host()],
        Some(Selector::All) => official.to_vec(),
        Some(Selector::Values(values)) if values.is_empty() => vec![host()],
        Some(Selector::Values(values)) => values.iter().map(|v| parse(v)).collect(),
    }
}

fn validate<T: PartialEq + fmt::Display>(
    values: Vec<T>,
    official: bool,
    supported: &[T],
    invalid: impl Fn(String) -> Error,
) -> Result<Vec<T>> {
    let mut unique: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if official && !supported.contains(&value) {
            return Err(invalid(value.to_string()));
        }
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    Ok(unique)
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Is this pair in the official release table at all?
pub fn is_official_combo(target: &Target) -> bool {
    target.platform.official_archs().contains(&target.arch)
}

/// Minimum (inclusive) and maximum (exclusive) Electron version for pairs
/// that were introduced after 1.0 or later discontinued.
fn version_range(target: &Target) -> Option<(&'static str, Option<&'static str>)> {
    match (&target.platform, &target.arch) {
        (Platform::Darwin | Platform::Mas, Arch::Arm64 | Arch::Universal) => {
            Some(("11.0.0-beta.1", None))
        }
        (Platform::Linux, Arch::Arm64) => Some(("1.8.0", None)),
        (Platform::Linux, Arch::Mips64el) => Some(("1.8.2-beta.5", Some("2.0.0-0"))),
        (Platform::Win32, Arch::Arm64) => Some(("6.0.8", None)),
        _ => None,
    }
}

/// Whether Electron `version` ships a build for `target`.
///
/// Prerelease versions are ordered normally, so `11.0.0-beta.3` satisfies
/// a `11.0.0-beta.1` minimum.
pub fn is_supported_by_version(target: &Target, version: &Version) -> bool {
    let Some((min, max)) = version_range(target) else {
        return true;
    };
    let above_min = Version::parse(min).is_ok_and(|min| *version >= min);
    let below_max = match max {
        Some(max) => Version::parse(max).is_ok_and(|max| *version < max),
        None => true,
    };
    above_min && below_max
}

/// Expands resolved platforms and archs into buildable targets.
///
/// Unofficial or version-gated pairs are skipped with a warning unless every
/// platform and arch was requested. A request where everything is skipped
/// yields an empty list.
pub fn expand_targets(
    request: &TargetRequest<'_>,
    platforms: &[Platform],
    archs: &[Arch],
    electron_version: &Version,
    filter: Option<&TargetFilter>,
    output: &OutputManager,
) -> Vec<Target> {
    let warn = !request.all_requested();
    let mut targets = Vec::new();

    for arch in archs {
        for platform in platforms {
            let target = Target::new(platform.clone(), arch.clone());
            if request.official {
                if !is_official_combo(&target) {
                    if warn {
                        let _ = output.warn(&format!(
                            "The platform/arch combination {}/{} is not currently supported by Electron, skipping",
                            platform, arch
                        ));
                    }
                    continue;
                }
                if !is_supported_by_version(&target, electron_version) {
                    if warn {
                        let _ = output.warn(&format!(
                            "Official {}/{} support only exists in Electron {}, skipping",
                            platform,
                            arch,
                            describe_range(&target)
                        ));
                    }
                    continue;
                }
                if let Some(filter) = filter
                    && filter(&target)
                {
                    log::debug!("Target {} dropped by target filter", target);
                    continue;
                }
            }
            targets.push(target);
        }
    }

    targets
}

fn describe_range(target: &Target) -> String {
    match version_range(target) {
        Some((min, Some(max))) => format!(">={} <{}", min, max),
        Some((min, None)) => format!(">={}", min),
        None => String::from("*"),
    }
}
