use clap::ValueEnum;

use crate::config::ProviderKind;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum ProviderFlag {
    Azure,
    Stub,
}

impl ProviderFlag {
    pub(crate) const fn as_domain(self) -> ProviderKind {
        match self {
            ProviderFlag::Azure => ProviderKind::Azure,
            ProviderFlag::Stub => ProviderKind::Stub,
        }
    }

    pub(crate) fn from_env() -> Option<Self> {
        let raw = std::env::var("IMGFIND_PROVIDER").ok()?;
        Self::from_str(raw.trim(), true).ok()
    }
}
