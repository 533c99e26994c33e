use chrono_tz::Tz;
use std::env;
use thiserror::Error;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,

    // DVBViewer backend
    pub api_host: String,
    pub api_port: u16,
    pub requires_authentication: bool,
    pub username: String,
    pub password: String,
    pub backend_timezone: Tz,
    pub fetch_timeout_ms: u64,
    pub user_agent: String,

    // Channels
    pub channel_favourites: bool,
    pub default_channel_group: Option<String>,
    pub timer_channel_group: Option<String>,
    pub channel_cache_ttl_secs: u64,

    // Timers
    pub timer_pre_padding_mins: u32,
    pub timer_post_padding_mins: u32,
    pub timer_task: Option<String>,
    pub check_recording_title: bool,
    pub check_recording_subtitle: bool,
    pub check_removed_recording: bool,
    pub check_timer_name: bool,
    pub refresh_interval_secs: u64,

    // Library
    pub skip_already_in_library: bool,
    pub library_profile: LibraryProfile,

    // Recordings
    pub path_substitution: Option<PathSubstitution>,

    // Genres
    pub genres: GenreConfig,
}

/// How library presence is decided for an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryProfile {
    SeasonEpisode,
    EpisodeName,
}

impl LibraryProfile {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "season_episode" | "season_and_episode_numbers" => Some(Self::SeasonEpisode),
            "episode_name" => Some(Self::EpisodeName),
            _ => None,
        }
    }
}

/// Rewrites backend-local recording paths into paths the host can open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSubstitution {
    pub local: String,
    pub remote: String,
}

impl PathSubstitution {
    pub fn apply(&self, path: &str) -> String {
        path.replace(&self.local, &self.remote)
    }
}

/// Content classification strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenreMode {
    /// EIT content codes, exact match
    Coded,
    /// Administrator keywords matched against the overview text
    Text,
}

/// Per-bucket codes (coded mode) or keywords (text mode)
#[derive(Debug, Clone)]
pub struct GenreConfig {
    pub mode: GenreMode,
    pub case_sensitive: bool,
    pub movie: Vec<String>,
    pub series: Vec<String>,
    pub sport: Vec<String>,
    pub news: Vec<String>,
    pub kids: Vec<String>,
    pub live: Vec<String>,
}

impl GenreConfig {
    /// DVB EIT content nibbles as decimal codes
    pub fn coded_defaults() -> Self {
        let codes = |range: &[u8]| range.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            mode: GenreMode::Coded,
            case_sensitive: true,
            movie: codes(&[16, 17, 18, 19, 20, 22, 23, 24]),
            series: codes(&[21]),
            sport: codes(&(64..=75).collect::<Vec<_>>()),
            news: codes(&[32, 33, 34, 35, 36]),
            kids: codes(&[80, 81, 82, 83, 84, 85]),
            live: codes(&[179]),
        }
    }

    pub fn text_defaults() -> Self {
        Self {
            mode: GenreMode::Text,
            case_sensitive: true,
            movie: Vec::new(),
            series: Vec::new(),
            sport: Vec::new(),
            news: Vec::new(),
            kids: Vec::new(),
            live: Vec::new(),
        }
    }

    fn from_env() -> Self {
        let mode = match env::var("GENRE_MODE")
            .unwrap_or_else(|_| "coded".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" => GenreMode::Text,
            _ => GenreMode::Coded,
        };

        let defaults = match mode {
            GenreMode::Coded => Self::coded_defaults(),
            GenreMode::Text => Self::text_defaults(),
        };

        Self {
            mode,
            case_sensitive: env_bool("GENRE_CASE_SENSITIVE", true),
            movie: env_list("GENRE_MOVIE").unwrap_or(defaults.movie),
            series: env_list("GENRE_SERIES").unwrap_or(defaults.series),
            sport: env_list("GENRE_SPORT").unwrap_or(defaults.sport),
            news: env_list("GENRE_NEWS").unwrap_or(defaults.news),
            kids: env_list("GENRE_KIDS").unwrap_or(defaults.kids),
            live: env_list("GENRE_LIVE").unwrap_or(defaults.live),
        }
    }
}

/// Configuration problems reported at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DVBViewer host name must not be empty")]
    MissingHost,
    #[error("DVBViewer API port must not be 0")]
    InvalidPort,
    #[error("Username and password are required when authentication is enabled")]
    MissingCredentials,
    #[error("Local and remote file paths are required when path substitution is enabled")]
    IncompletePathSubstitution,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let path_substitution = if env_bool("REQUIRES_PATH_SUBSTITUTION", false) {
            Some(PathSubstitution {
                local: env::var("LOCAL_FILE_PATH").unwrap_or_default(),
                remote: env::var("REMOTE_FILE_PATH").unwrap_or_default(),
            })
        } else {
            None
        };

        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "8099".to_string())
                .parse()
                .unwrap_or(8099),

            // DVBViewer backend
            api_host: env::var("DVBVIEWER_HOST").unwrap_or_else(|_| "localhost".to_string()),
            api_port: env::var("DVBVIEWER_API_PORT")
                .unwrap_or_else(|_| "8089".to_string())
                .parse()
                .unwrap_or(8089),
            requires_authentication: env_bool("DVBVIEWER_REQUIRES_AUTH", false),
            username: env::var("DVBVIEWER_USERNAME").unwrap_or_default(),
            password: env::var("DVBVIEWER_PASSWORD").unwrap_or_default(),
            backend_timezone: env::var("DVBVIEWER_TIMEZONE")
                .ok()
                .and_then(|tz| tz.parse().ok())
                .unwrap_or(defaults.backend_timezone),
            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000),
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),

            // Channels
            channel_favourites: env_bool("CHANNEL_FAVOURITES", true),
            default_channel_group: env_opt("DEFAULT_CHANNEL_GROUP"),
            timer_channel_group: env_opt("TIMER_CHANNEL_GROUP"),
            channel_cache_ttl_secs: env::var("CHANNEL_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "240".to_string())
                .parse()
                .unwrap_or(240), // 4 minutes

            // Timers
            timer_pre_padding_mins: env::var("TIMER_PRE_PADDING")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            timer_post_padding_mins: env::var("TIMER_POST_PADDING")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            timer_task: env_opt("TIMER_TASK"),
            check_recording_title: env_bool("CHECK_RECORDING_TITLE", true),
            check_recording_subtitle: env_bool("CHECK_RECORDING_SUBTITLE", true),
            check_removed_recording: env_bool("CHECK_REMOVED_RECORDING", true),
            check_timer_name: env_bool("CHECK_TIMER_NAME", true),
            refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .unwrap_or(900), // 15 minutes

            // Library
            skip_already_in_library: env_bool("SKIP_ALREADY_IN_LIBRARY", false),
            library_profile: match env::var("SKIP_LIBRARY_PROFILE") {
                Ok(p) => LibraryProfile::parse(&p).unwrap_or_else(|| {
                    tracing::warn!("Unknown SKIP_LIBRARY_PROFILE '{}', using season/episode", p);
                    LibraryProfile::SeasonEpisode
                }),
                Err(_) => LibraryProfile::SeasonEpisode,
            },

            path_substitution,
            genres: GenreConfig::from_env(),
        }
    }

    /// Check the loaded values, mirroring what the backend needs to be reachable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.api_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.requires_authentication
            && (self.username.trim().is_empty() || self.password.trim().is_empty())
        {
            return Err(ConfigError::MissingCredentials);
        }
        if let Some(sub) = &self.path_substitution {
            if sub.local.trim().is_empty() || sub.remote.trim().is_empty() {
                return Err(ConfigError::IncompletePathSubstitution);
            }
        }
        Ok(())
    }

    /// Base URL of the recording service web API
    pub fn api_base_url(&self) -> String {
        format!("http://{}:{}/", self.api_host.trim_end_matches('/'), self.api_port)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.requires_authentication {
            Some((self.username.as_str(), self.password.as_str()))
        } else {
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8099,
            api_host: "localhost".to_string(),
            api_port: 8089,
            requires_authentication: false,
            username: String::new(),
            password: String::new(),
            backend_timezone: Tz::UTC,
            fetch_timeout_ms: 30_000,
            user_agent: format!("dvbviewer-livetv/{}", env!("CARGO_PKG_VERSION")),
            channel_favourites: true,
            default_channel_group: None,
            timer_channel_group: None,
            channel_cache_ttl_secs: 240,
            timer_pre_padding_mins: 5,
            timer_post_padding_mins: 10,
            timer_task: None,
            check_recording_title: true,
            check_recording_subtitle: true,
            check_removed_recording: true,
            check_timer_name: true,
            refresh_interval_secs: 900,
            skip_already_in_library: false,
            library_profile: LibraryProfile::SeasonEpisode,
            path_substitution: None,
            genres: GenreConfig::coded_defaults(),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Comma separated list; unset means "use defaults", set-but-empty means an empty bucket
fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
