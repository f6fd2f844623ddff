use std::collections::HashMap;
use std::env;
use std::time::Duration;

use tracing::{info, warn};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub view: ViewSettings,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_source(&EnvSource)
    }

    /// Creates a configuration from an explicit variable source.
    pub fn from_source(source: &dyn VarSource) -> Self {
        Self {
            service: ServiceConfig::from_source(source),
            view: ViewSettings::from_source(source),
            session: SessionConfig::from_source(source),
        }
    }
}

/// Where configuration values come from.
pub trait VarSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads process environment variables.
pub struct EnvSource;

impl VarSource for EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        match env::var(name) {
            Ok(value) => Some(value),
            Err(env::VarError::NotPresent) => None,
            Err(err) => {
                warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
                None
            }
        }
    }
}

impl VarSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Connection settings for the external data and placement service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    base_url: String,
    timeout: Duration,
    user_id: String,
}

impl ServiceConfig {
    const DEFAULT_BASE_URL: &'static str = "http://localhost:8000/api";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_USER_ID: &'static str = "user1";

    /// Creates a configuration pointing at `base_url` with default timeout and user.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_id: Self::DEFAULT_USER_ID.to_string(),
        }
    }

    fn from_source(source: &dyn VarSource) -> Self {
        let base_url = match var_string(source, "STOWAGE_API_BASE_URL") {
            Some(raw) if raw.starts_with("http://") || raw.starts_with("https://") => raw,
            Some(raw) => {
                warn!(
                    "⚠️ STOWAGE_API_BASE_URL ('{}') is not an http(s) URL. Using {}.",
                    raw,
                    Self::DEFAULT_BASE_URL
                );
                Self::DEFAULT_BASE_URL.to_string()
            }
            None => Self::DEFAULT_BASE_URL.to_string(),
        };

        let timeout_secs = load_with_warning(
            source,
            "STOWAGE_HTTP_TIMEOUT_SECS",
            Self::DEFAULT_TIMEOUT_SECS,
            |value| value > 0,
            "must be greater than 0",
        );

        let user_id = var_string(source, "STOWAGE_USER_ID")
            .unwrap_or_else(|| Self::DEFAULT_USER_ID.to_string());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            user_id,
        }
    }

    /// Base URL without trailing slash, e.g. `http://localhost:8000/api`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request timeout for every call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Operator id sent along with placement commands.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Full URL of an endpoint below the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{base}/{path}",
            base = self.base_url,
            path = path.trim_start_matches('/')
        )
    }
}

/// Viewport and render loop settings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewSettings {
    /// Initial viewport width in pixels
    pub viewport_width: u32,
    /// Initial viewport height in pixels
    pub viewport_height: u32,
    /// Vertical field of view in degrees
    pub fov_deg: f32,
    /// Orbit damping factor, (0, 1]
    pub damping: f32,
    /// Render loop ticks per second
    pub frame_rate: u32,
    /// Whether a ground grid is added below the container
    pub show_grid: bool,
}

impl ViewSettings {
    pub const DEFAULT_VIEWPORT_WIDTH: u32 = 800;
    pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 500;
    pub const DEFAULT_FOV_DEG: f32 = 75.0;
    pub const DEFAULT_DAMPING: f32 = 0.05;
    pub const DEFAULT_FRAME_RATE: u32 = 60;
    pub const DEFAULT_SHOW_GRID: bool = true;

    /// Creates a builder for custom settings.
    pub fn builder() -> ViewSettingsBuilder {
        ViewSettingsBuilder::default()
    }

    /// Interval between two render loop ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    fn from_source(source: &dyn VarSource) -> Self {
        let viewport_width = load_with_warning(
            source,
            "STOWAGE_VIEWPORT_WIDTH",
            Self::DEFAULT_VIEWPORT_WIDTH,
            |value| value > 0,
            "must be greater than 0",
        );
        let viewport_height = load_with_warning(
            source,
            "STOWAGE_VIEWPORT_HEIGHT",
            Self::DEFAULT_VIEWPORT_HEIGHT,
            |value| value > 0,
            "must be greater than 0",
        );
        let fov_deg = load_with_warning(
            source,
            "STOWAGE_CAMERA_FOV_DEG",
            Self::DEFAULT_FOV_DEG,
            |value| value > 1.0 && value < 179.0,
            "must be between 1 and 179",
        );
        let damping = load_with_warning(
            source,
            "STOWAGE_ORBIT_DAMPING",
            Self::DEFAULT_DAMPING,
            |value| value > 0.0 && value <= 1.0,
            "must be in (0, 1]",
        );
        let frame_rate = load_with_warning(
            source,
            "STOWAGE_FRAME_RATE",
            Self::DEFAULT_FRAME_RATE,
            |value| (1..=240).contains(&value),
            "must be between 1 and 240",
        );
        let show_grid = var_string(source, "STOWAGE_SHOW_GRID")
            .and_then(|raw| parse_bool(&raw, "STOWAGE_SHOW_GRID"))
            .unwrap_or(Self::DEFAULT_SHOW_GRID);

        Self::builder()
            .viewport(viewport_width, viewport_height)
            .fov_deg(fov_deg)
            .damping(damping)
            .frame_rate(frame_rate)
            .show_grid(show_grid)
            .build()
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            viewport_width: Self::DEFAULT_VIEWPORT_WIDTH,
            viewport_height: Self::DEFAULT_VIEWPORT_HEIGHT,
            fov_deg: Self::DEFAULT_FOV_DEG,
            damping: Self::DEFAULT_DAMPING,
            frame_rate: Self::DEFAULT_FRAME_RATE,
            show_grid: Self::DEFAULT_SHOW_GRID,
        }
    }
}

/// Builder for [`ViewSettings`].
#[derive(Clone, Debug, Default)]
pub struct ViewSettingsBuilder {
    settings: ViewSettings,
}

impl ViewSettingsBuilder {
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.settings.viewport_width = width;
        self.settings.viewport_height = height;
        self
    }

    pub fn fov_deg(mut self, fov_deg: f32) -> Self {
        self.settings.fov_deg = fov_deg;
        self
    }

    pub fn damping(mut self, damping: f32) -> Self {
        self.settings.damping = damping;
        self
    }

    pub fn frame_rate(mut self, frame_rate: u32) -> Self {
        self.settings.frame_rate = frame_rate;
        self
    }

    pub fn show_grid(mut self, show_grid: bool) -> Self {
        self.settings.show_grid = show_grid;
        self
    }

    pub fn build(self) -> ViewSettings {
        self.settings
    }
}

/// What the operator binary should do in one session.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    /// Container to view; the first listed container when absent
    pub container_id: Option<String>,
    /// Unplaced item to preview
    pub select_item: Option<String>,
    /// Confirm the previewed placement without asking
    pub auto_confirm: bool,
}

impl SessionConfig {
    fn from_source(source: &dyn VarSource) -> Self {
        let auto_confirm = var_string(source, "STOWAGE_AUTO_CONFIRM")
            .and_then(|raw| parse_bool(&raw, "STOWAGE_AUTO_CONFIRM"))
            .unwrap_or(false);
        if auto_confirm {
            info!("STOWAGE_AUTO_CONFIRM is set; previewed placements will be committed");
        }
        Self {
            container_id: var_string(source, "STOWAGE_CONTAINER_ID"),
            select_item: var_string(source, "STOWAGE_SELECT_ITEM"),
            auto_confirm,
        }
    }
}

fn var_string(source: &dyn VarSource, name: &str) -> Option<String> {
    source.get(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_with_warning<T>(
    source: &dyn VarSource,
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match var_string(source, var_name) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) if validator(value) => value,
            Ok(_) => {
                warn!(
                    "⚠️ {} contains invalid value '{}': {}. Using {}.",
                    var_name, raw, invalid_hint, default
                );
                default
            }
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
