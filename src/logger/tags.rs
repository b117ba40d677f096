/// Log tags identify the subsystem a message came from.
///
/// Each tag maps to a `--debug-<key>` flag through [`LogTag::to_debug_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Feed,
    Discovery,
    Enrichment,
    Twitter,
    Telegram,
    Storage,
    Subscriptions,
    Dispatch,
}

impl LogTag {
    pub const ALL: [LogTag; 10] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Feed,
        LogTag::Discovery,
        LogTag::Enrichment,
        LogTag::Twitter,
        LogTag::Telegram,
        LogTag::Storage,
        LogTag::Subscriptions,
        LogTag::Dispatch,
    ];

    /// Key used in `--debug-<key>` / `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> String {
        self.to_plain_string().to_lowercase()
    }

    /// Uppercase label used in console and file output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Feed => "FEED",
            LogTag::Discovery => "DISCOVERY",
            LogTag::Enrichment => "ENRICH",
            LogTag::Twitter => "TWITTER",
            LogTag::Telegram => "TELEGRAM",
            LogTag::Storage => "STORAGE",
            LogTag::Subscriptions => "SUBS",
            LogTag::Dispatch => "DISPATCH",
        }
    }

    pub fn from_debug_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.to_debug_key() == key.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_key_round_trip() {
        for tag in LogTag::ALL {
            assert_eq!(LogTag::from_debug_key(&tag.to_debug_key()), Some(tag));
        }
        assert_eq!(LogTag::from_debug_key("unknown"), None);
    }
}
