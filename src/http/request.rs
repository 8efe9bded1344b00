//! Request metadata extraction for logging.
//!
//! # Responsibilities
//! - Turn headers into `http.header.<name>` attributes
//! - Classify the user agent (os, device, type, browser) with woothee
//! - Collect the per-request attributes logged by the logging middleware
//!
//! # Design Decisions
//! - Pure functions with no state; safe to call from any request task
//! - Unrecognized user-agent fields are reported as `unknown`, never omitted

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;

use woothee::parser::Parser;

use crate::observability::logging::Attribute;

const UNKNOWN: &str = "unknown";
const WOOTHEE_UNKNOWN: &str = "UNKNOWN";

// woothee categories and crawler names.
const PC: &str = "pc";
const SMARTPHONE: &str = "smartphone";
const MOBILEPHONE: &str = "mobilephone";
const CRAWLER: &str = "crawler";
const GOOGLEBOT: &str = "Googlebot";

/// Attributes describing an inbound request.
pub fn request_attributes(request: &Request) -> Vec<Attribute> {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let mut attrs = vec![
        Attribute::new("http.method", request.method().as_str()),
        Attribute::new("http.path", request.uri().path()),
        Attribute::new("http.remoteAddr", remote_addr),
    ];

    if let Some(query) = request.uri().query().filter(|q| !q.is_empty()) {
        attrs.push(Attribute::new("http.query", query));
    }

    attrs.extend(parse_headers(request.headers()));

    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    attrs.extend(parse_user_agent(user_agent));

    attrs
}

/// One `http.header.<lowercase name>` attribute per header, sorted by name.
///
/// Repeated headers are joined with `"; "`.
pub fn parse_headers(headers: &HeaderMap) -> Vec<Attribute> {
    let mut names: Vec<_> = headers.keys().collect();
    names.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    names
        .into_iter()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join("; ");
            Attribute::new(format!("http.header.{}", name.as_str().to_ascii_lowercase()), joined)
        })
        .collect()
}

/// Device class of a user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Bot,
    GoogleBot,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
            DeviceType::Bot => "bot",
            DeviceType::GoogleBot => "google_bot",
        }
    }
}

/// Fields recognized in a user-agent string. Empty means not recognized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgent {
    pub os: String,
    pub os_version: String,
    pub url: String,
    pub device: String,
    pub device_type: Option<DeviceType>,
    pub browser: String,
    pub browser_version: String,
}

impl UserAgent {
    /// Classify `raw` with woothee.
    ///
    /// woothee reports neither the hardware model nor a crawler's contact
    /// URL; those two are read from the platform and `+http` tokens.
    pub fn parse(raw: &str) -> Self {
        let mut ua = UserAgent {
            url: crawler_url(raw),
            ..Default::default()
        };
        let Some(result) = Parser::new().parse(raw) else {
            return ua;
        };

        let name: &str = &result.name;
        let category: &str = &result.category;
        let os: &str = &result.os;
        let version: &str = &result.version;

        if category == CRAWLER {
            if name == GOOGLEBOT {
                ua.device_type = Some(DeviceType::GoogleBot);
                ua.browser = "googlebot".to_string();
            } else {
                ua.device_type = Some(DeviceType::Bot);
                ua.browser = UNKNOWN.to_string();
            }
            return ua;
        }

        let (os_name, device) = match os {
            "iPhone" | "iPad" | "iPod" => ("iOS", os.to_string()),
            "Mac OSX" => ("macOS", String::new()),
            "Android" => ("Android", android_model(raw)),
            _ if os.starts_with("Windows") => ("Windows", String::new()),
            _ => (os, String::new()),
        };
        ua.os = known(os_name);
        ua.os_version = known(result.os_version.trim_start_matches("NT "));
        ua.device = device;

        ua.device_type = match category {
            PC => Some(DeviceType::Desktop),
            SMARTPHONE | MOBILEPHONE if os == "iPad" || is_android_tablet(os, raw) => {
                Some(DeviceType::Tablet)
            }
            SMARTPHONE | MOBILEPHONE => Some(DeviceType::Mobile),
            _ => None,
        };

        if ua.device_type.is_some() {
            let browser = match name {
                "Chrome" => "chrome",
                "Safari" => "safari",
                "Firefox" => "firefox",
                "Opera" => "opera",
                "Internet Explorer" => "internet_explorer",
                "Edge" => "edge",
                _ => "",
            };
            ua.browser = browser.to_string();
            if !browser.is_empty() {
                ua.browser_version = known(version);
            }
        }
        ua
    }
}

/// Attributes for a raw user-agent header. Empty input yields no attributes.
pub fn parse_user_agent(raw: &str) -> Vec<Attribute> {
    if raw.is_empty() {
        return Vec::new();
    }
    let ua = UserAgent::parse(raw);

    let mut attrs = vec![
        ("http.user_agent.os", ua.os),
        ("http.user_agent.os_Version", ua.os_version),
        ("http.user_agent.URL", ua.url),
        ("http.user_agent.device", ua.device),
    ];
    if let Some(kind) = ua.device_type {
        attrs.push(("http.user_agent.type", kind.as_str().to_string()));
        attrs.push(("http.user_agent.browser", ua.browser));
        if !matches!(kind, DeviceType::Bot | DeviceType::GoogleBot) {
            attrs.push(("http.user_agent.browser_version", ua.browser_version));
        }
    }

    attrs
        .into_iter()
        .map(|(key, value)| {
            if value.is_empty() {
                Attribute::new(key, UNKNOWN)
            } else {
                Attribute::new(key, value)
            }
        })
        .collect()
}

/// woothee's placeholder for an unrecognized field, mapped to empty.
fn known(value: &str) -> String {
    if value == WOOTHEE_UNKNOWN {
        String::new()
    } else {
        value.to_string()
    }
}

/// Android tablets omit the `Mobile` token.
fn is_android_tablet(os: &str, raw: &str) -> bool {
    os == "Android" && !raw.contains("Mobile")
}

/// Model from the Android platform group, e.g. `SM-A505F` in
/// `(Linux; Android 10; SM-A505F)`.
fn android_model(raw: &str) -> String {
    let Some(platform) = raw
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(group, _)| group)
    else {
        return String::new();
    };

    let mut tokens = platform.split(';').map(str::trim);
    tokens
        .by_ref()
        .find(|token| token.starts_with("Android"))
        .and_then(|_| tokens.find(|token| !token.is_empty() && *token != "wv" && *token != "K"))
        .map(|model| model.split(" Build/").next().unwrap_or(model).to_string())
        .unwrap_or_default()
}

/// Contact URL advertised by crawlers, e.g. `(+http://www.google.com/bot.html)`.
fn crawler_url(raw: &str) -> String {
    raw.find("+http")
        .map(|i| &raw[i + 1..])
        .and_then(|rest| rest.split([')', ';', ' ']).next())
        .unwrap_or_default()
        .to_string()
}
