/// Log tags, one per subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Webserver,
    Hub,
    Connection,
    Registry,
    Dispatcher,
    Listener,
}

impl LogTag {
    pub const ALL: [LogTag; 8] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Webserver,
        LogTag::Hub,
        LogTag::Connection,
        LogTag::Registry,
        LogTag::Dispatcher,
        LogTag::Listener,
    ];

    /// Key used by `--debug <key>`
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Webserver => "webserver",
            LogTag::Hub => "hub",
            LogTag::Connection => "connection",
            LogTag::Registry => "registry",
            LogTag::Dispatcher => "dispatcher",
            LogTag::Listener => "listener",
        }
    }

    pub fn from_debug_key(key: &str) -> Option<Self> {
        let key = key.to_lowercase();
        Self::ALL.iter().copied().find(|tag| tag.to_debug_key() == key)
    }

    /// Uppercase label without colors (file output)
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Webserver => "WEBSERVER",
            LogTag::Hub => "HUB",
            LogTag::Connection => "CONN",
            LogTag::Registry => "REGISTRY",
            LogTag::Dispatcher => "DISPATCH",
            LogTag::Listener => "LISTENER",
        }
    }
}
